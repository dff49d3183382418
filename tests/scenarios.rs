mod common;

use common::{core, core_with, login, send};
use rusty_chatd::chat::Limits;

use std::time::Duration;

#[tokio::test]
async fn private_message_between_two_users() {
    let mut core = core();
    let alice = login(&mut core, "alice").await;
    let bob = login(&mut core, "bob").await;

    send(&mut core, alice, "/msg bob hello").await;
    assert_eq!(core.outbox.take(bob), vec!["[Private] alice: hello"]);
    assert_eq!(core.outbox.take(alice), vec!["[Private to bob] hello"]);
}

#[tokio::test]
async fn messaging_yourself_always_fails() {
    let mut core = core();
    let alice = login(&mut core, "alice").await;
    for text in &["hi", "hello there", "x", "/msg alice nested"] {
        send(&mut core, alice, &format!("/msg alice {}", text)).await;
        assert_eq!(
            core.outbox.take(alice),
            vec!["Error: You cannot message yourself."]
        );
    }
}

#[tokio::test]
async fn private_message_to_unknown_user() {
    let mut core = core();
    let alice = login(&mut core, "alice").await;
    send(&mut core, alice, "/msg nobody hi").await;
    assert_eq!(core.outbox.take(alice), vec!["Error: User 'nobody' not found."]);
}

#[tokio::test]
async fn group_message_scenario() {
    let mut core = core();
    let alice = login(&mut core, "alice").await;
    let bob = login(&mut core, "bob").await;

    send(&mut core, alice, "/creategroup team").await;
    send(&mut core, alice, "/addmember team bob").await;
    assert_eq!(
        core.outbox.take(alice),
        vec!["Group 'team' created.", "Added bob to group 'team'."]
    );
    assert_eq!(
        core.outbox.take(bob),
        vec!["You have been added to group 'team' by alice."]
    );

    send(&mut core, bob, "/gmsg team hi").await;
    assert_eq!(core.outbox.take(alice), vec!["[Group team] bob: hi"]);
    assert_eq!(core.outbox.take(bob), vec!["[Group team] bob: hi"]);
}

#[tokio::test]
async fn group_fan_out_is_members_online_minus_sender() {
    let mut core = core();
    let alice = login(&mut core, "alice").await;
    let bob = login(&mut core, "bob").await;
    let dave = login(&mut core, "dave").await;

    send(&mut core, alice, "/creategroup team").await;
    send(&mut core, alice, "/addmember team bob").await;
    // carol has never connected, membership doesn't care
    send(&mut core, alice, "/addmember team carol").await;
    core.outbox.take(alice);
    core.outbox.take(bob);

    send(&mut core, alice, "/gmsg team standup in 5").await;
    assert_eq!(core.outbox.take(alice), vec!["[Group team] alice: standup in 5"]);
    assert_eq!(core.outbox.take(bob), vec!["[Group team] alice: standup in 5"]);
    assert!(core.outbox.take(dave).is_empty());

    // carol logs in later and gets group traffic
    let carol = login(&mut core, "carol").await;
    send(&mut core, bob, "/gmsg team ok").await;
    assert_eq!(core.outbox.take(carol), vec!["[Group team] bob: ok"]);
    assert_eq!(core.outbox.take(alice), vec!["[Group team] bob: ok"]);
    assert_eq!(core.outbox.take(bob), vec!["[Group team] bob: ok"]);

    send(&mut core, dave, "/gmsg team let me in").await;
    assert_eq!(
        core.outbox.take(dave),
        vec!["Error: You are not a member of group 'team'."]
    );
    assert!(core.outbox.take(alice).is_empty());

    send(&mut core, dave, "/gmsg crew hi").await;
    assert_eq!(core.outbox.take(dave), vec!["Error: Group 'crew' not found."]);
}

#[tokio::test]
async fn group_admin_rules() {
    let mut core = core();
    let alice = login(&mut core, "alice").await;
    let bob = login(&mut core, "bob").await;

    send(&mut core, alice, "/creategroup team").await;
    send(&mut core, bob, "/creategroup team").await;
    assert_eq!(core.outbox.take(bob), vec!["Error: Group 'team' already exists."]);

    send(&mut core, alice, "/addmember team bob").await;
    core.outbox.take(alice);
    core.outbox.take(bob);

    send(&mut core, bob, "/addmember team carol").await;
    assert_eq!(
        core.outbox.take(bob),
        vec!["Error: You are not an admin of group 'team'."]
    );
    send(&mut core, bob, "/kickmember team alice").await;
    assert_eq!(
        core.outbox.take(bob),
        vec!["Error: You are not an admin of group 'team'."]
    );
    send(&mut core, alice, "/kickmember team carol").await;
    assert_eq!(
        core.outbox.take(alice),
        vec!["Error: 'carol' is not a member of group 'team'."]
    );
    send(&mut core, alice, "/kickmember nogroup bob").await;
    assert_eq!(core.outbox.take(alice), vec!["Error: Group 'nogroup' not found."]);

    send(&mut core, alice, "/kickmember team bob").await;
    assert_eq!(core.outbox.take(alice), vec!["Removed bob from group 'team'."]);
    assert_eq!(
        core.outbox.take(bob),
        vec!["You have been removed from group 'team' by alice."]
    );
    assert!(!core.registry.is_member("team", "bob"));
}

#[tokio::test]
async fn list_groups_shows_admins_and_members() {
    let mut core = core();
    let alice = login(&mut core, "alice").await;
    let bob = login(&mut core, "bob").await;

    send(&mut core, bob, "/listgroups").await;
    assert_eq!(core.outbox.take(bob), vec!["You are not in any groups."]);

    send(&mut core, alice, "/creategroup team").await;
    send(&mut core, alice, "/addmember team bob").await;
    send(&mut core, bob, "/creategroup band").await;
    core.outbox.take(bob);
    send(&mut core, bob, "/listgroups").await;
    assert_eq!(
        core.outbox.take(bob),
        vec![
            "Group band - admins: bob - members: bob",
            "Group team - admins: alice - members: alice, bob",
        ]
    );
}

#[tokio::test]
async fn same_username_evicts_previous_session() {
    let mut core = core();
    let first = login(&mut core, "alice").await;
    let bob = login(&mut core, "bob").await;

    let second = core.connected();
    send(&mut core, second, "alice").await;
    assert_eq!(
        core.outbox.take(first),
        vec!["You have been logged out because the same username logged in elsewhere."]
    );
    assert!(core.outbox.closed.contains(&first));
    assert!(!core.is_connected(first));
    assert_eq!(core.outbox.take(second), vec!["Welcome, alice!"]);
    assert_eq!(core.registry.lookup_by_username("alice"), Some(second));
    assert_eq!(
        core.registry.session(second).and_then(|s| s.username()),
        Some("alice")
    );
    assert!(core.registry.session(first).is_none());

    send(&mut core, bob, "/msg alice still there?").await;
    assert_eq!(core.outbox.take(second), vec!["[Private] bob: still there?"]);
    assert!(core.outbox.take(first).is_empty());

    // the evicted session's late close must not knock out the new owner
    core.disconnected(first);
    assert_eq!(core.registry.lookup_by_username("alice"), Some(second));
}

#[tokio::test]
async fn repeated_claims_leave_the_latest_owner() {
    let mut core = core();
    let mut sessions = Vec::new();
    for _ in 0..5 {
        let id = core.connected();
        send(&mut core, id, "alice").await;
        sessions.push(id);
    }
    let last = *sessions.last().unwrap();
    assert_eq!(core.registry.lookup_by_username("alice"), Some(last));
    for id in &sessions[..4] {
        assert!(core.outbox.closed.contains(id));
        assert_eq!(
            core.outbox.take(*id)[1],
            "You have been logged out because the same username logged in elsewhere."
        );
    }
    assert!(!core.outbox.closed.contains(&last));
}

#[tokio::test]
async fn disconnected_user_shows_offline_in_list() {
    let mut core = core();
    let alice = login(&mut core, "alice").await;
    let bob = login(&mut core, "bob").await;

    core.disconnected(bob);
    send(&mut core, alice, "/list").await;
    let listing = core.outbox.take(alice);
    assert_eq!(listing[0], "Users:");
    assert!(listing[1].starts_with("  alice: online since "));
    assert!(listing[2].starts_with("  bob: offline since "));

    send(&mut core, alice, "/msg bob you there").await;
    assert_eq!(core.outbox.take(alice), vec!["Error: User 'bob' not found."]);
}

#[tokio::test]
async fn broadcast_reaches_other_logged_in_users() {
    let mut core = core();
    let alice = login(&mut core, "alice").await;
    let bob = login(&mut core, "bob").await;
    let lurker = core.connected();

    send(&mut core, alice, "hello everyone").await;
    assert_eq!(core.outbox.take(bob), vec!["alice: hello everyone"]);
    assert!(core.outbox.take(alice).is_empty());
    assert!(core.outbox.take(lurker).is_empty());
}

#[tokio::test]
async fn whoami_and_help() {
    let mut core = core();
    let alice = login(&mut core, "alice").await;
    send(&mut core, alice, "/whoami").await;
    assert_eq!(core.outbox.take(alice), vec!["You are alice."]);
    send(&mut core, alice, "/help").await;
    let help = core.outbox.take(alice);
    assert_eq!(help[0], "Available commands:");
    assert!(help.iter().any(|l| l.contains("/sendfile")));
}

#[tokio::test]
async fn usage_errors_keep_the_connection() {
    let mut core = core();
    let alice = login(&mut core, "alice").await;
    send(&mut core, alice, "/msg bob").await;
    send(&mut core, alice, "/addmember team").await;
    send(&mut core, alice, "/sendfile bob notes.txt lots").await;
    assert_eq!(
        core.outbox.take(alice),
        vec![
            "Error: Usage: /msg <user> <message>",
            "Error: Usage: /addmember <group> <user>",
            "Error: Usage: /sendfile <user> <path> | /sendfile <user> <name> <size>",
        ]
    );
    assert!(core.is_connected(alice));
    assert!(core.outbox.closed.is_empty());
}

#[tokio::test]
async fn invalid_username_stays_unauthenticated() {
    let mut core = core();
    let id = core.connected();
    send(&mut core, id, "two words").await;
    let reply = core.outbox.take(id);
    assert_eq!(reply.len(), 1);
    assert!(reply[0].starts_with("Error: Invalid username"));
    assert_eq!(core.registry.username_of(id), None);

    // blank lines don't count as a claim
    send(&mut core, id, "   ").await;
    assert!(core.outbox.take(id).is_empty());

    send(&mut core, id, "alice").await;
    assert_eq!(core.outbox.take(id), vec!["Welcome, alice!"]);
}

#[tokio::test]
async fn commands_can_arrive_in_pieces() {
    let mut core = core();
    let alice = core.connected();
    let bob = login(&mut core, "bob").await;
    core.received(alice, b"ali").await;
    core.received(alice, b"ce\r\n/msg bob he").await;
    assert_eq!(core.outbox.take(alice), vec!["Welcome, alice!"]);
    core.received(alice, b"llo\n/whoami\n").await;
    assert_eq!(core.outbox.take(bob), vec!["[Private] alice: hello"]);
    assert_eq!(
        core.outbox.take(alice),
        vec!["[Private to bob] hello", "You are alice."]
    );
}

#[tokio::test]
async fn message_length_limits() {
    let mut core = core_with(Limits {
        max_message_len: 16,
        line_limit: 64,
        ..Limits::default()
    });
    let alice = login(&mut core, "alice").await;
    let bob = login(&mut core, "bob").await;

    send(&mut core, alice, "this line is a bit too long").await;
    assert_eq!(
        core.outbox.take(alice),
        vec!["Error: Message too long (max 16 bytes)."]
    );
    assert!(core.outbox.take(bob).is_empty());
    assert!(core.is_connected(alice));

    // no newline in sight past the cursor's limit: the client is dropped
    core.received(alice, &[b'x'; 100]).await;
    assert!(core.outbox.closed.contains(&alice));
    assert!(!core.is_connected(alice));
    assert_eq!(core.registry.lookup_by_username("alice"), None);
}

#[tokio::test]
async fn idle_sessions_are_swept() {
    let mut core = core();
    let alice = login(&mut core, "alice").await;
    let lurker = core.connected();

    let seen = core.registry.session(alice).unwrap().last_activity();
    let later = seen + Duration::from_secs(600);
    core.sweep_idle(later, Duration::from_secs(300));
    assert_eq!(
        core.outbox.take(alice),
        vec!["Error: Disconnected due to inactivity."]
    );
    assert!(core.outbox.closed.contains(&alice));
    assert!(core.outbox.closed.contains(&lurker));
    assert!(core.registry.session(lurker).is_none());
    assert!(core.registry.list_online()[0].1.starts_with("offline since "));
}
