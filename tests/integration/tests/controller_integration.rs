//! Integration tests for the playcore playback controller
//!
//! These tests drive the full stack: facade -> command worker -> engine
//! backend -> event delivery -> listener. They verify:
//! - The prepare/start/pause/seek/release lifecycle
//! - Engine replacement on re-prepare and late-callback filtering
//! - Listener slots (replacement, clearing, weak references)
//! - The buffering floor policy
//! - Marker, mute, and option persistence
//! - Engine setup faults surfacing on the error channel

use anyhow::Result;
use mockall::predicate::eq;
use playcore::{
    EngineEvent, EngineFactory, EngineOption, EventSink, MediaEngine, PlaybackController,
    PlaybackRequest, PlaybackState, PlayerListener, SimEngineFactory, SimScript, SurfaceHandle,
    ENGINE_SETUP_CODE, INFO_VIDEO_ROTATION_CHANGED, PLAY_POSITION_NONE,
};
use playcore_integration_tests::{
    init_test_logging, mock_engine::MockEngine, wait_until, RecordedEvent, RecordingListener,
    StagedFactory,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;

const WAIT: Duration = Duration::from_secs(2);

type Fixture = (
    PlaybackController,
    Arc<SimEngineFactory>,
    Arc<RecordingListener>,
);

fn build_controller(script: SimScript) -> Result<Fixture> {
    init_test_logging();

    let factory = Arc::new(SimEngineFactory::new(script));
    let listener = RecordingListener::new();
    let controller = PlaybackController::builder()
        .with_factory(Arc::clone(&factory) as Arc<dyn EngineFactory>)
        .with_listener(Arc::clone(&listener) as Arc<dyn PlayerListener>)
        .build()?;

    Ok((controller, factory, listener))
}

#[tokio::test]
async fn test_initial_state() -> Result<()> {
    let (controller, factory, _listener) = build_controller(SimScript::default())?;

    assert_eq!(controller.state(), PlaybackState::Idle);
    assert_eq!(controller.last_state(), PlaybackState::Idle);
    assert_eq!(controller.current_position(), 0);
    assert_eq!(controller.duration(), 0);
    assert_eq!(controller.video_width(), 0);
    assert_eq!(controller.current_video_width(), 0);
    assert!(!controller.is_playing());
    assert_eq!(controller.play_tag(), "");
    assert_eq!(controller.play_position(), PLAY_POSITION_NONE);
    assert_eq!(factory.created(), 0);

    Ok(())
}

#[tokio::test]
async fn test_prepare_delivers_prepared_once() -> Result<()> {
    let (controller, factory, listener) = build_controller(SimScript::default())?;

    controller.prepare(PlaybackRequest::new("sim://episode-1"));
    assert!(listener.wait_for(WAIT, |e| *e == RecordedEvent::Prepared));

    // Give a hypothetical straggler a chance to double-fire before counting.
    sleep(Duration::from_millis(100)).await;
    assert_eq!(listener.count(&RecordedEvent::Prepared), 1);
    assert_eq!(controller.state(), PlaybackState::Prepared);
    assert_eq!(factory.created(), 1);
    assert_eq!(
        factory.engine(0).unwrap().prepared_url().as_deref(),
        Some("sim://episode-1")
    );

    Ok(())
}

#[tokio::test]
async fn test_empty_url_creates_nothing() -> Result<()> {
    let (controller, factory, listener) = build_controller(SimScript::default())?;

    controller.prepare(PlaybackRequest::new(""));
    sleep(Duration::from_millis(100)).await;

    assert_eq!(factory.created(), 0);
    assert!(listener.events().is_empty());
    assert_eq!(controller.state(), PlaybackState::Idle);

    Ok(())
}

#[tokio::test]
async fn test_reprepare_binds_second_engine() -> Result<()> {
    let (controller, factory, listener) = build_controller(SimScript::default())?;

    // The first engine answers late and ignores release, modeling a
    // backend whose callbacks keep arriving after it was replaced.
    factory.queue_script(SimScript {
        prepare_delay: Duration::from_millis(120),
        emit_after_release: true,
        video_size: (720, 480),
        ..SimScript::default()
    });

    controller.prepare(PlaybackRequest::new("sim://first"));
    controller.prepare(PlaybackRequest::new("sim://second"));

    assert!(listener.wait_for(WAIT, |e| *e == RecordedEvent::Prepared));
    assert!(wait_until(WAIT, || factory.created() == 2));
    assert!(factory.engine(0).unwrap().is_released());
    assert!(!factory.engine(1).unwrap().is_released());

    // Wait past the first engine's scripted delay: its late signals carry
    // a superseded session and must be dropped.
    sleep(Duration::from_millis(250)).await;
    assert_eq!(listener.count(&RecordedEvent::Prepared), 1);
    assert_eq!(controller.video_width(), 1280);
    assert_eq!(controller.current_video_width(), 1280);
    assert_eq!(
        factory.engine(1).unwrap().prepared_url().as_deref(),
        Some("sim://second")
    );

    Ok(())
}

#[tokio::test]
async fn test_release_without_engine_is_noop() -> Result<()> {
    let (controller, factory, listener) = build_controller(SimScript::default())?;

    controller.release();
    assert!(wait_until(WAIT, || controller.state() == PlaybackState::Released));
    assert_eq!(factory.created(), 0);
    assert!(listener.events().is_empty());

    // Repeated rapid calls stay safe.
    controller.release();
    controller.release();
    sleep(Duration::from_millis(50)).await;
    assert_eq!(controller.state(), PlaybackState::Released);

    Ok(())
}

#[tokio::test]
async fn test_release_resets_markers_floor_and_mute() -> Result<()> {
    let (controller, factory, listener) = build_controller(SimScript::default())?;

    controller.set_play_tag("row-7");
    controller.set_play_position(7);
    controller.set_buffer_point(55);
    controller.set_muted(true);

    controller.prepare(PlaybackRequest::new("sim://episode-7"));
    assert!(listener.wait_for(WAIT, |e| *e == RecordedEvent::Prepared));

    controller.release();

    // Markers reset synchronously, before the worker has run the command.
    assert_eq!(controller.play_tag(), "");
    assert_eq!(controller.play_position(), PLAY_POSITION_NONE);

    assert!(wait_until(WAIT, || controller.state() == PlaybackState::Released));
    assert!(factory.engine(0).unwrap().is_released());
    assert_eq!(controller.buffer_point(), 0);
    assert!(!controller.is_muted());

    Ok(())
}

#[tokio::test]
async fn test_play_pause_seek_lifecycle() -> Result<()> {
    let (controller, _factory, listener) = build_controller(SimScript::default())?;

    controller.prepare(PlaybackRequest::new("sim://episode-2"));
    assert!(listener.wait_for(WAIT, |e| *e == RecordedEvent::Prepared));

    controller.start();
    assert_eq!(controller.state(), PlaybackState::Playing);
    assert!(controller.is_playing());

    sleep(Duration::from_millis(60)).await;
    assert!(controller.current_position() > 0);

    controller.seek_to(30_000);
    assert!(listener.wait_for(WAIT, |e| *e == RecordedEvent::SeekComplete));
    assert!(controller.current_position() >= 30_000);

    controller.pause();
    assert_eq!(controller.state(), PlaybackState::Paused);
    let parked = controller.current_position();
    sleep(Duration::from_millis(60)).await;
    assert_eq!(controller.current_position(), parked);

    controller.start();
    assert_eq!(controller.state(), PlaybackState::Playing);
    assert_eq!(controller.last_state(), PlaybackState::Paused);

    Ok(())
}

#[tokio::test]
async fn test_stop_halts_playback() -> Result<()> {
    let (controller, _factory, listener) = build_controller(SimScript::default())?;

    controller.prepare(PlaybackRequest::new("sim://episode-8"));
    assert!(listener.wait_for(WAIT, |e| *e == RecordedEvent::Prepared));

    controller.start();
    controller.stop();

    assert_eq!(controller.state(), PlaybackState::Stopped);
    assert!(!controller.is_playing());
    assert_eq!(controller.last_state(), PlaybackState::Playing);

    Ok(())
}

#[tokio::test]
async fn test_cleared_listener_hears_nothing() -> Result<()> {
    let (controller, factory, listener) = build_controller(SimScript::default())?;

    controller.prepare(PlaybackRequest::new("sim://episode-3"));
    assert!(listener.wait_for(WAIT, |e| *e == RecordedEvent::Prepared));
    let heard = listener.events().len();

    controller.set_listener(None);
    assert!(controller.listener().is_none());

    // The engine keeps reporting; nothing may reach the cleared slot.
    controller.seek_to(10_000);
    let sink = factory.engine(0).unwrap().event_sink().unwrap();
    sink.emit(EngineEvent::BufferingUpdate { percent: 90 });

    sleep(Duration::from_millis(150)).await;
    assert_eq!(listener.events().len(), heard);

    Ok(())
}

#[tokio::test]
async fn test_dropped_listener_is_not_kept_alive() -> Result<()> {
    init_test_logging();

    let factory = Arc::new(SimEngineFactory::new(SimScript::default()));
    let controller = PlaybackController::new(Arc::clone(&factory) as Arc<dyn EngineFactory>)?;

    let listener = RecordingListener::new();
    controller.set_listener(Some(Arc::clone(&listener) as Arc<dyn PlayerListener>));
    assert!(controller.listener().is_some());

    drop(listener);
    assert!(controller.listener().is_none());

    // Events against a dead listener must be a silent no-op.
    controller.prepare(PlaybackRequest::new("sim://episode-4"));
    assert!(wait_until(WAIT, || controller.state() == PlaybackState::Prepared));

    Ok(())
}

#[tokio::test]
async fn test_last_listener_is_parked_not_notified() -> Result<()> {
    let (controller, _factory, active) = build_controller(SimScript::default())?;

    let parked = RecordingListener::new();
    controller.set_last_listener(Some(Arc::clone(&parked) as Arc<dyn PlayerListener>));

    controller.prepare(PlaybackRequest::new("sim://episode-5"));
    assert!(active.wait_for(WAIT, |e| *e == RecordedEvent::Prepared));

    sleep(Duration::from_millis(100)).await;
    assert!(parked.events().is_empty());
    assert!(controller.last_listener().is_some());

    // Clearing the active slot leaves the parked one untouched.
    controller.set_listener(None);
    assert!(controller.listener().is_none());
    assert!(controller.last_listener().is_some());

    Ok(())
}

#[tokio::test]
async fn test_buffering_floor_is_monotone() -> Result<()> {
    let (controller, factory, listener) = build_controller(SimScript::default())?;

    controller.prepare(PlaybackRequest::new("sim://episode-6"));
    assert!(listener.wait_for(WAIT, |e| *e == RecordedEvent::Prepared));

    controller.set_buffer_point(60);
    let sink = factory.engine(0).unwrap().event_sink().unwrap();

    sink.emit(EngineEvent::BufferingUpdate { percent: 40 });
    assert!(listener.wait_for(WAIT, |e| *e == RecordedEvent::BufferingUpdate(60)));

    sink.emit(EngineEvent::BufferingUpdate { percent: 80 });
    assert!(listener.wait_for(WAIT, |e| *e == RecordedEvent::BufferingUpdate(80)));

    // Updates clamp to the floor without ever raising it.
    assert_eq!(controller.buffer_point(), 60);
    assert!(!listener.has(|e| *e == RecordedEvent::BufferingUpdate(40)));

    Ok(())
}

#[tokio::test]
async fn test_mute_is_reapplied_to_replacement_engine() -> Result<()> {
    let (controller, factory, listener) = build_controller(SimScript::default())?;

    controller.set_muted(true);
    controller.prepare(PlaybackRequest::new("sim://a"));
    assert!(listener.wait_for(WAIT, |e| *e == RecordedEvent::Prepared));
    assert!(factory.engine(0).unwrap().is_muted());

    controller.prepare(PlaybackRequest::new("sim://b"));
    assert!(wait_until(WAIT, || {
        factory.engine(1).map(|e| e.is_muted()).unwrap_or(false)
    }));
    assert!(controller.is_muted());

    Ok(())
}

#[tokio::test]
async fn test_engine_options_reach_backend_in_order() -> Result<()> {
    let (controller, factory, listener) = build_controller(SimScript::default())?;

    let options = vec![
        EngineOption::int(4, "framedrop", 1),
        EngineOption::text(1, "user_agent", "playcore/0.1"),
        EngineOption::int(4, "mediacodec", 0),
    ];
    controller.set_engine_options(options.clone());

    controller.prepare(PlaybackRequest::new("sim://tuned"));
    assert!(listener.wait_for(WAIT, |e| *e == RecordedEvent::Prepared));

    assert_eq!(factory.engine(0).unwrap().applied_options(), options);
    assert_eq!(controller.engine_options(), options);

    Ok(())
}

#[tokio::test]
async fn test_surface_attach_and_release() -> Result<()> {
    let (controller, factory, listener) = build_controller(SimScript::default())?;

    // Without an engine the queued surface commands are ignored.
    controller.set_display(SurfaceHandle::new(1));

    controller.prepare(PlaybackRequest::new("sim://surface"));
    assert!(listener.wait_for(WAIT, |e| *e == RecordedEvent::Prepared));

    let surface = SurfaceHandle::new(2);
    controller.set_display(surface);
    let engine = factory.engine(0).unwrap();
    assert!(wait_until(WAIT, || engine.attached_surface() == Some(surface)));

    controller.release_surface(surface);
    assert!(wait_until(WAIT, || engine.attached_surface().is_none()));
    assert_eq!(engine.released_surfaces(), vec![surface]);

    Ok(())
}

#[tokio::test]
async fn test_failed_prepare_surfaces_setup_error() -> Result<()> {
    let (controller, factory, listener) = build_controller(SimScript::default())?;
    factory.queue_script(SimScript {
        fail_prepare: true,
        ..SimScript::default()
    });

    controller.prepare(PlaybackRequest::new("sim://broken"));
    assert!(listener.wait_for(WAIT, |e| {
        *e == RecordedEvent::Error(ENGINE_SETUP_CODE, ENGINE_SETUP_CODE)
    }));

    assert_eq!(controller.state(), PlaybackState::Error);
    assert!(factory.engine(0).unwrap().is_released());
    assert!(controller.engine().is_none());

    // The queue keeps serving commands after the fault.
    controller.prepare(PlaybackRequest::new("sim://working"));
    assert!(listener.wait_for(WAIT, |e| *e == RecordedEvent::Prepared));
    assert_eq!(controller.state(), PlaybackState::Prepared);

    Ok(())
}

#[tokio::test]
async fn test_created_hook_sees_every_engine() -> Result<()> {
    let (controller, _factory, listener) = build_controller(SimScript::default())?;

    let seen = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&seen);
    controller.set_engine_created_hook(Some(Arc::new(move |_engine| {
        counter.fetch_add(1, Ordering::SeqCst);
    })));

    controller.prepare(PlaybackRequest::new("sim://one"));
    assert!(listener.wait_for(WAIT, |e| *e == RecordedEvent::Prepared));

    controller.prepare(PlaybackRequest::new("sim://two"));
    assert!(wait_until(WAIT, || seen.load(Ordering::SeqCst) == 2));

    Ok(())
}

#[tokio::test]
async fn test_info_events_pass_through_verbatim() -> Result<()> {
    let (controller, factory, listener) = build_controller(SimScript::default())?;

    controller.prepare(PlaybackRequest::new("sim://rotating"));
    assert!(listener.wait_for(WAIT, |e| *e == RecordedEvent::Prepared));

    let sink = factory.engine(0).unwrap().event_sink().unwrap();
    sink.emit(EngineEvent::Info {
        code: INFO_VIDEO_ROTATION_CHANGED,
        extra: 90,
    });

    assert!(listener.wait_for(WAIT, |e| {
        *e == RecordedEvent::Info(INFO_VIDEO_ROTATION_CHANGED, 90)
    }));

    Ok(())
}

#[tokio::test]
async fn test_accessors_turn_live_after_prepare() -> Result<()> {
    let (controller, _factory, listener) = build_controller(SimScript {
        video_size: (1920, 1080),
        duration_ms: 90_000,
        net_speed: 2_000_000,
        ..SimScript::default()
    })?;

    assert_eq!(controller.duration(), 0);
    assert_eq!(controller.video_width(), 0);
    assert_eq!(controller.net_speed(), 0);

    controller.prepare(PlaybackRequest::new("sim://feature"));
    assert!(listener.wait_for(WAIT, |e| *e == RecordedEvent::VideoSizeChanged));
    assert!(listener.wait_for(WAIT, |e| *e == RecordedEvent::Prepared));

    assert_eq!(controller.duration(), 90_000);
    assert_eq!(controller.video_width(), 1920);
    assert_eq!(controller.video_height(), 1080);
    assert_eq!(controller.current_video_width(), 1920);
    assert_eq!(controller.current_video_height(), 1080);
    assert_eq!(controller.net_speed(), 2_000_000);
    assert_eq!(controller.buffered_percentage(), 100);

    Ok(())
}

#[tokio::test]
async fn test_engine_contract_with_mock() -> Result<()> {
    init_test_logging();

    let captured: Arc<Mutex<Option<EventSink>>> = Arc::new(Mutex::new(None));

    let mut mock = MockEngine::new();
    let sink_slot = Arc::clone(&captured);
    mock.expect_connect_events()
        .times(1)
        .returning(move |sink| {
            *sink_slot.lock().unwrap() = Some(sink);
        });
    mock.expect_set_muted()
        .with(eq(false))
        .times(1)
        .return_const(());
    mock.expect_prepare_async()
        .times(1)
        .returning(|_request, _options| Ok(()));
    mock.expect_release().times(1).return_const(());

    let factory = StagedFactory::new(vec![Arc::new(mock) as Arc<dyn MediaEngine>]);
    let listener = RecordingListener::new();
    let controller = PlaybackController::builder()
        .with_factory(factory as Arc<dyn EngineFactory>)
        .with_listener(Arc::clone(&listener) as Arc<dyn PlayerListener>)
        .build()?;

    controller.prepare(PlaybackRequest::new("mock://contract"));
    assert!(wait_until(WAIT, || captured.lock().unwrap().is_some()));

    // Readiness arrives through the sink the controller wired up.
    let sink = captured.lock().unwrap().clone().unwrap();
    sink.emit(EngineEvent::Prepared);
    assert!(listener.wait_for(WAIT, |e| *e == RecordedEvent::Prepared));
    assert_eq!(controller.state(), PlaybackState::Prepared);

    controller.release();
    assert!(wait_until(WAIT, || controller.state() == PlaybackState::Released));

    Ok(())
}

#[tokio::test]
#[cfg_attr(not(feature = "stress-tests"), ignore)]
async fn test_stress_rapid_reprepare() -> Result<()> {
    let (controller, factory, _listener) = build_controller(SimScript {
        prepare_delay: Duration::from_millis(5),
        emit_after_release: true,
        ..SimScript::default()
    })?;

    for i in 0..50 {
        controller.prepare(PlaybackRequest::new(format!("sim://clip-{}", i)));
    }

    assert!(wait_until(Duration::from_secs(5), || factory.created() == 50));
    assert!(wait_until(Duration::from_secs(5), || {
        controller.state() == PlaybackState::Prepared
    }));

    // Every superseded engine was torn down; only the last survives.
    for i in 0..49 {
        assert!(factory.engine(i).unwrap().is_released(), "engine {} leaked", i);
    }
    assert!(!factory.engine(49).unwrap().is_released());

    Ok(())
}
