//! Access scenarios driven through the control loop, one frame at a time.

mod common;

use common::{
    AUTO_CLOSE_SECS, Harness, START_TIME, assert_single_input, input_payloads, lock_config,
    send_payloads,
};
use serde_json::json;
use smartlock_controller::Tick;
use smartlock_core::LockConfig;
use smartlock_core::constants::AUTO_CLOSE_TIMER;
use smartlock_hardware::SoundCue;

#[tokio::test]
async fn test_granted_card_opens_once() {
    let mut h = Harness::new(lock_config("A1B2"));

    h.scan_card("a1b2");
    h.drain().await;

    assert!(!h.control.state().closed);
    assert_eq!(h.driver.writes(), vec![true, false]);
    assert_eq!(
        h.control.timers().expiry(AUTO_CLOSE_TIMER),
        Some(START_TIME + AUTO_CLOSE_SECS as u64)
    );

    let events = h.take_events();
    let payload = assert_single_input(&events, false);
    assert_eq!(payload["message"], "lock open by a1b2");
    assert!(payload.get("blocked").is_none());
    assert!(payload.get("sound").is_none());
    assert!(send_payloads(&events).is_empty());
}

#[tokio::test]
async fn test_granted_keypad_code_opens() {
    let mut h = Harness::new(lock_config("1234"));

    h.type_code("1234");
    h.drain().await;

    assert!(!h.control.state().closed);
    assert_eq!(h.sound.cues(), vec![SoundCue::Granted]);
    let events = h.take_events();
    let payload = assert_single_input(&events, false);
    assert_eq!(payload["message"], "lock open by 1234");
}

#[tokio::test]
async fn test_code_while_open_closes_by_reentry() {
    let mut h = Harness::new(LockConfig {
        closed: false,
        ..lock_config("A1B2")
    });
    h.control.start();
    h.take_events();

    h.scan_card("ffff");
    h.drain().await;

    assert!(h.control.state().closed);
    assert_eq!(h.driver.writes(), vec![true, false, true]);
    assert_eq!(
        h.sound.cues(),
        vec![SoundCue::Granted, SoundCue::Denied, SoundCue::Ambient]
    );

    let events = h.take_events();
    let payload = assert_single_input(&events, true);
    assert_eq!(payload["message"], "lock close by ffff");
}

#[tokio::test]
async fn test_submit_key_while_open_closes() {
    let mut h = Harness::new(lock_config("1234"));
    h.type_code("1234");
    h.drain().await;
    h.take_events();

    h.send("01KB11\n");
    h.drain().await;

    assert!(h.control.state().closed);
    let events = h.take_events();
    let payload = assert_single_input(&events, true);
    assert_eq!(payload["message"], "lock close by system");
    assert!(h.control.timers().is_empty());
}

#[tokio::test]
async fn test_digits_while_open_leave_lock_open() {
    let mut h = Harness::new(lock_config("1234"));
    h.type_code("1234");
    h.drain().await;
    h.take_events();

    h.send("01KB5\n");
    h.send("01KB6\n");
    h.drain().await;

    assert!(!h.control.state().closed);
    assert!(h.take_events().is_empty());
}

#[tokio::test]
async fn test_digits_while_open_do_not_leak_into_next_code() {
    let mut h = Harness::new(lock_config("1234"));
    h.type_code("1234");
    h.drain().await;

    h.send("01KB5\n");
    h.send("01KB6\n");
    h.drain().await;
    assert_eq!(h.control.keypad_buffer(), "");

    h.clock.advance(AUTO_CLOSE_SECS as u64);
    h.drain().await;
    assert!(h.control.state().closed);
    h.take_events();

    h.type_code("1234");
    h.drain().await;

    assert!(!h.control.state().closed);
    assert!(h.control.attempts().is_empty());
    let events = h.take_events();
    assert!(send_payloads(&events).is_empty());
    let payload = assert_single_input(&events, false);
    assert_eq!(payload["message"], "lock open by 1234");
}

#[tokio::test]
async fn test_empty_acl_denies_with_alert() {
    let mut h = Harness::new(lock_config(""));

    h.scan_card("1234");
    h.drain().await;

    assert!(h.control.state().closed);
    assert_eq!(h.driver.writes(), vec![true]);
    assert!(h.control.timers().is_empty());
    assert_eq!(h.sound.cues(), vec![SoundCue::Denied]);

    let events = h.take_events();
    assert!(input_payloads(&events).is_empty());
    assert_eq!(
        send_payloads(&events),
        vec![json!({"message": "alert", "level": 1, "comment": "badcode 1234 (ACL empty)"})]
    );
}

#[tokio::test]
async fn test_unknown_code_denies_with_alert() {
    let mut h = Harness::new(lock_config("1234"));

    h.type_code("4321");
    h.drain().await;

    assert!(h.control.state().closed);
    assert_eq!(h.control.attempts().len(), 1);
    assert_eq!(h.control.attempts().last().unwrap().code, "4321");
    assert_eq!(
        send_payloads(&h.take_events()),
        vec![json!({"message": "alert", "level": 1, "comment": "badcode 4321"})]
    );
}

#[tokio::test]
async fn test_blocked_never_opens() {
    let mut h = Harness::new(LockConfig {
        blocked: true,
        ..lock_config("1234")
    });

    h.type_code("1234");
    h.scan_card("1234");
    h.drain().await;

    assert!(h.control.state().closed);
    assert_eq!(h.driver.writes(), vec![true]);
    assert!(h.control.attempts().is_empty());
    assert!(h.take_events().is_empty());
}

#[tokio::test]
async fn test_blocked_drains_one_frame_per_tick() {
    let mut h = Harness::new(LockConfig {
        blocked: true,
        ..lock_config("1234")
    });

    h.scan_card("1234");
    h.scan_card("1234");

    assert_eq!(h.control.tick().await, Tick::Processed);
    assert_eq!(h.control.tick().await, Tick::Processed);
    assert_eq!(h.control.tick().await, Tick::Idle);
}

#[tokio::test]
async fn test_clear_key_discards_entry() {
    let mut h = Harness::new(lock_config("1234"));

    h.send("01KB9\n");
    h.send("01KB10\n");
    h.type_code("1234");
    h.drain().await;

    assert!(!h.control.state().closed);
}

#[tokio::test]
async fn test_malformed_frame_resets_entry() {
    let mut h = Harness::new(lock_config("1234"));

    h.send("01KB1\n");
    h.send("01KB2\n");
    h.send("01ZZ3\n");
    h.send("01KB3\n");
    h.send("01KB4\n");
    h.send("01KB11\n");
    h.drain().await;

    // "34" was submitted, not "1234"
    assert!(h.control.state().closed);
    assert_eq!(h.control.attempts().last().unwrap().code, "34");
    assert_eq!(
        h.sound.cues(),
        vec![SoundCue::Denied, SoundCue::Denied]
    );
}

#[tokio::test]
async fn test_keypad_overflow_resets_entry() {
    let mut h = Harness::new(lock_config("1234"));

    for _ in 0..17 {
        h.send("01KB7\n");
    }
    h.drain().await;

    assert_eq!(h.control.keypad_buffer(), "");
    assert_eq!(h.sound.cues(), vec![SoundCue::Denied]);
}
