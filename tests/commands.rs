//! Integration tests for chat command dispatch.

mod common;

use common::{TestApp, owner, streamer, viewer};
use slreq::error::ResCode;

#[tokio::test]
async fn test_non_commands_are_ignored() {
    let t = TestApp::new();
    let user = viewer("alice");

    assert!(t.say(&user, "hello chat").await.is_none());
    assert!(t.say(&user, "!").await.is_none());
    assert!(t.say(&user, "!notacommand").await.is_none());
    assert!(t.say(&user, "?ping").await.is_none());
}

#[tokio::test]
async fn test_onboarding_hint_appended_once() {
    let t = TestApp::new();
    let first = t.run(&viewer("alice"), "!ping").await;
    assert_eq!(first.code, ResCode::Ok);
    assert!(first.message.starts_with("pong"));
    assert!(first.message.contains("!toggle"));

    let second = t.run(&viewer("alice"), "!ping").await;
    assert_eq!(second.message, "pong");
}

#[tokio::test]
async fn test_silent_denial_does_not_consume_onboarding() {
    let t = TestApp::new();
    let denied = t.run(&viewer("alice"), "!next").await;
    assert_eq!(denied.code, ResCode::Unauthorized);
    assert!(denied.is_silent());

    let reply = t.run(&viewer("alice"), "!ping").await;
    assert!(reply.message.contains("Thanks for using the bot"));
}

#[tokio::test]
async fn test_requests_start_disabled() {
    let t = TestApp::new();
    t.run(&viewer("alice"), "!ping").await;

    let reply = t.run(&viewer("alice"), "!req 128").await;
    assert_eq!(reply.code, ResCode::Disabled);

    t.open().await;
    let reply = t.run(&viewer("alice"), "!r 128").await;
    assert_eq!(reply.code, ResCode::Ok);
    assert!(reply.message.contains("position 1"), "{}", reply.message);
}

#[tokio::test]
async fn test_queue_flow() {
    let t = TestApp::new();
    t.open().await;
    let (alice, bob) = (viewer("alice"), viewer("bob"));

    assert_eq!(t.run(&alice, "!req 1").await.code, ResCode::Ok);
    assert_eq!(t.run(&alice, "!req 2").await.code, ResCode::Ok);
    // default limit is two per user
    assert_eq!(t.run(&alice, "!req 3").await.code, ResCode::MaxPerUser);
    assert_eq!(t.run(&bob, "!req 1").await.code, ResCode::AlreadyAdded);
    assert_eq!(t.run(&bob, "!req 3").await.code, ResCode::Ok);
    assert_eq!(t.run(&bob, "!req unknown").await.code, ResCode::NotFound);
    assert_eq!(t.run(&bob, "!req").await.code, ResCode::InvalidValue);

    let list = t.run(&bob, "!list").await;
    assert!(list.message.contains("Page 1 of 1 (3 levels)"), "{}", list.message);
    assert!(list.message.contains("1. Level 1 (1)"));
    assert!(list.message.contains("3. Level 3 (3)"));
    assert_eq!(t.run(&bob, "!list 2").await.code, ResCode::End);

    let pos = t.run(&bob, "!pos").await;
    assert!(pos.message.contains("position 3"), "{}", pos.message);

    let next = t.run_as_mod(&viewer("mod"), "!next").await;
    assert_eq!(next.code, ResCode::Ok);
    assert!(next.message.contains("'Level 1'"));
    assert!(next.message.contains("requested by alice"));
    assert!(next.message.contains("Up next: 'Level 2'"));

    let info = t.run(&bob, "!info").await;
    assert!(info.message.starts_with("Now Playing"));
    assert!(info.message.contains("Level 2"));

    let clear = t.run_as_mod(&viewer("mod"), "!clear").await;
    assert_eq!(clear.message, "Queue cleared (2 levels).");
    assert_eq!(t.run_as_mod(&viewer("mod"), "!next").await.code, ResCode::Empty);
}

#[tokio::test]
async fn test_lookup_failure_is_generic_error() {
    let t = TestApp::new();
    t.open().await;

    let reply = t.run(&viewer("alice"), "!req fail").await;
    assert_eq!(reply.code, ResCode::Error);
    assert!(reply.message.starts_with("An error occurred"));
}

#[tokio::test]
async fn test_remove_and_privilege_mode() {
    let t = TestApp::new();
    t.open().await;
    let (alice, bob, m) = (viewer("alice"), viewer("bob"), viewer("mod"));

    t.run(&alice, "!req 1").await;
    t.run(&bob, "!req 2").await;
    t.run(&alice, "!req 3").await;

    let own = t.run(&alice, "!oops").await;
    assert_eq!(own.message, "Removed 'Level 3' by creator from the queue.");
    assert_eq!(t.run(&m, "!remove").await.code, ResCode::NotFound);

    // privilege mode without a query removes the overall last entry
    let last = t.run_as_mod(&m, "!privilege remove").await;
    assert_eq!(last.message, "Removed 'Level 2' by creator from the queue.");

    t.run(&bob, "!req 2").await;
    let by_id = t.run_as_mod(&m, "!pr rm 1").await;
    assert!(by_id.message.contains("Level 1"));

    assert_eq!(t.run_as_mod(&m, "!privilege next").await.code, ResCode::InvalidKey);
    let denied = t.run(&bob, "!privilege remove").await;
    assert!(denied.is_silent());
    assert_eq!(denied.code, ResCode::Unauthorized);
    let unknown = t.run_as_mod(&m, "!privilege frobnicate").await;
    assert!(unknown.is_silent());
}

#[tokio::test]
async fn test_perm_override_and_reset() {
    let t = TestApp::new();
    t.open().await;
    let s = streamer();
    let alice = viewer("alice");

    assert_eq!(t.run(&alice, "!next").await.code, ResCode::Unauthorized);

    let set = t.run(&s, "!perm next user").await;
    assert_eq!(set.message, "'next' now requires user.");
    assert_eq!(t.run(&alice, "!n").await.code, ResCode::Empty);

    let reset = t.run(&s, "!perm n reset").await;
    assert_eq!(reset.code, ResCode::Ok);
    assert_eq!(t.run(&alice, "!next").await.code, ResCode::Unauthorized);

    assert_eq!(t.run(&s, "!perm next owner").await.code, ResCode::InvalidRange);
    assert_eq!(t.run(&s, "!perm next blacklisted").await.code, ResCode::InvalidValue);
    assert_eq!(t.run(&s, "!perm next wizard").await.code, ResCode::InvalidValue);
    assert_eq!(t.run(&s, "!perm bogus user").await.code, ResCode::InvalidKey);
    // owner-only commands are out of reach
    assert!(t.run(&s, "!perm global-bl user").await.is_silent());
    // moderators cannot run perm at all
    assert_eq!(t.run_as_mod(&viewer("mod"), "!perm next user").await.code, ResCode::Unauthorized);
}

#[tokio::test]
async fn test_settings_and_prefix() {
    let t = TestApp::new();
    t.open().await;
    let s = streamer();

    assert_eq!(t.run(&s, "!set max_queue_size 0").await.code, ResCode::InvalidRange);
    assert_eq!(t.run(&s, "!set colour red").await.code, ResCode::InvalidKey);
    assert_eq!(t.run(&s, "!set enabled maybe").await.code, ResCode::InvalidValue);
    assert_eq!(t.run(&s, "!set max_queue_size 1").await.code, ResCode::Ok);

    t.run(&viewer("alice"), "!req 1").await;
    assert_eq!(t.run(&viewer("bob"), "!req 2").await.code, ResCode::Full);

    assert_eq!(t.run(&s, "!set prefix ?").await.message, "Set 'prefix' to '?'");
    assert!(t.say(&s, "!ping").await.is_none());
    assert_eq!(t.run(&s, "?ping").await.message, "pong");

    let shown = t.run(&s, "?settings").await;
    assert!(shown.message.contains("prefix:?"));
    assert!(shown.message.contains("max_queue_size:1"));

    let random = t.run(&s, "?random").await;
    assert!(random.message.contains("?next"));
}

#[tokio::test]
async fn test_channel_blacklist() {
    let t = TestApp::new();
    t.open().await;
    let m = viewer("mod");

    let added = t.run_as_mod(&m, "!bl add @Alice").await;
    assert_eq!(added.message, "Added alice to the blacklist.");
    assert_eq!(t.run_as_mod(&m, "!bl add alice").await.code, ResCode::AlreadyAdded);
    assert_eq!(t.run_as_mod(&m, "!bl add ghost").await.code, ResCode::NotFound);

    let denied = t.run(&viewer("alice"), "!req 1").await;
    assert_eq!(denied.code, ResCode::Blacklisted);
    assert!(denied.is_silent());

    t.run_as_mod(&m, "!blacklist level add 7").await;
    assert_eq!(t.run(&viewer("bob"), "!req 7").await.code, ResCode::Blacklisted);

    assert_eq!(t.run_as_mod(&m, "!bl remove alice").await.code, ResCode::Ok);
    assert_eq!(t.run(&viewer("alice"), "!req 1").await.code, ResCode::Ok);
    assert_eq!(t.run_as_mod(&m, "!bl frob").await.code, ResCode::InvalidValue);
}

#[tokio::test]
async fn test_global_blacklist() {
    let t = TestApp::new();
    t.open().await;
    let dev = owner();
    let session = t.app.sessions.login(&viewer("alice")).unwrap();

    assert_eq!(t.run(&dev, "!gbl users add alice").await.message, "Added alice");
    assert!(t.app.db.sessions().all().unwrap().is_empty());
    assert!(t.app.sessions.mark_active(&session.secret, false).is_err());
    assert!(t.app.db.sessions().by_secret(&session.secret).unwrap().is_none());
    let ignored = t.run(&viewer("alice"), "!ping").await;
    assert_eq!(ignored.code, ResCode::GlobalBlacklisted);
    assert!(ignored.is_silent());

    assert_eq!(t.run(&dev, "!gbl add 9").await.code, ResCode::Ok);
    assert_eq!(t.run(&viewer("bob"), "!req 9").await.code, ResCode::GlobalBlacklisted);

    assert_eq!(t.run(&dev, "!gbl remove 9").await.code, ResCode::Ok);
    assert_eq!(t.run(&viewer("bob"), "!req 9").await.code, ResCode::Ok);

    // owner-only, even for the streamer
    assert!(t.run(&streamer(), "!gbl add 10").await.is_silent());
}

#[tokio::test]
async fn test_help() {
    let t = TestApp::new();
    t.open().await;
    let alice = viewer("alice");

    let all = t.run(&alice, "!help").await;
    assert!(all.message.contains("!req"));
    assert!(!all.message.contains("global-bl"));

    let remove = t.run(&alice, "!h rm").await;
    assert!(remove.message.starts_with("!remove:"));
    assert!(remove.message.contains("privilege mode"));
    assert_eq!(t.run(&alice, "!help nope").await.code, ResCode::NotFound);
}

#[tokio::test]
async fn test_part_deletes_channel_data() {
    let t = TestApp::new();
    t.open().await;
    t.run(&viewer("alice"), "!req 1").await;
    t.run(&streamer(), "!perm next user").await;

    assert_eq!(t.run(&viewer("alice"), "!part").await.code, ResCode::Unauthorized);
    let reply = t.run(&streamer(), "!leave").await;
    assert_eq!(reply.message, "Leaving the chat... Thanks for using the bot!");

    let channels = t.app.db.channels();
    assert!(channels.queue(common::CHANNEL_ID).unwrap().is_empty());
    assert!(!channels.settings(common::CHANNEL_ID).unwrap().enabled);
    assert_eq!(t.run(&viewer("alice"), "!next").await.code, ResCode::Unauthorized);

    // the channel starts over as if new
    let again = t.run(&viewer("alice"), "!ping").await;
    assert!(again.message.contains("Thanks for using the bot"));
}

#[tokio::test]
async fn test_broadcast_reaches_active_sessions() {
    let t = TestApp::new();
    t.open().await;
    let dev = owner();

    let none = t.run(&dev, "!broadcast maintenance soon").await;
    assert_eq!(none.code, ResCode::Empty);
    assert_eq!(none.message, "No active sessions");
    assert!(none.targets.is_empty());

    let alice = t.app.sessions.login(&viewer("alice")).unwrap();
    t.app.sessions.login(&viewer("bob")).unwrap();
    t.app.sessions.attach(&alice.secret).unwrap();

    let sent = t.run(&dev, "!bc maintenance   soon").await;
    assert_eq!(sent.code, ResCode::Ok);
    assert_eq!(sent.message, "maintenance soon");
    assert_eq!(sent.targets, vec!["alice".to_string()]);

    assert_eq!(t.run(&dev, "!broadcast").await.code, ResCode::InvalidValue);

    // owner-only, even for the streamer
    assert!(t.run(&streamer(), "!broadcast hi").await.is_silent());
    assert!(t.run_as_mod(&viewer("carol"), "!broadcast hi").await.is_silent());
}

