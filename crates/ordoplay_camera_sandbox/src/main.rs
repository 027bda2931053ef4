// SPDX-License-Identifier: MIT OR Apache-2.0
//! Headless camera director sandbox.
//!
//! Loads a director config (RON path as the first argument, or a built-in
//! one), registers a few scripted cameras and runs a short scene:
//! - a close-up outranks the wide shot after one second
//! - a drone camera is soloed for a moment
//! - a shot track takes the channel over near the end
//!
//! Run with `RUST_LOG=ordoplay_camera=trace` to see every tick.

use ordoplay_camera::{
    CameraDirector, CameraId, CameraState, ChannelId, DirectorConfig, DirectorError, ShotClip, ShotTrack,
    ShotTrackPlayer,
};
use std::path::Path;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG: &str = r#"(
    channels: [
        (id: 0, activate_after: 0.25, min_duration: 0.5,
         default_blend: (curve: (a: 0.0, b: 0.0, bias: 0.0), duration: 1.0)),
        (id: 1, time_mode: Unscaled),
    ],
    custom_blends: [
        (channel: 0, from: Some("Drone"), to: None,
         blend: (curve: (a: 0.0, b: 0.0, bias: 0.0), duration: 0.0)),
    ],
)"#;

const TICK: f32 = 1.0 / 30.0;
const SCENE_LENGTH: f32 = 9.0;

struct Rig {
    wide: CameraId,
    close: CameraId,
    drone: CameraId,
    minimap: CameraId,
}

fn main() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("ordoplay_camera=debug,ordoplay_camera_sandbox=info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting camera sandbox v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(std::env::args().nth(1).as_deref()) {
        tracing::error!("Sandbox failed: {e}");
        std::process::exit(1);
    }
}

fn run(config_path: Option<&str>) -> Result<(), DirectorError> {
    let config = match config_path {
        Some(path) => {
            tracing::info!("Loading config from {path}");
            DirectorConfig::load(Path::new(path))?
        }
        None => DirectorConfig::from_ron_str(DEFAULT_CONFIG)?,
    };

    let mut director = CameraDirector::from_config(&config)?;
    let main = ChannelId(0);
    let overlay = ChannelId(1);
    let rig = Rig {
        wide: director.register_camera("Wide", main, 10)?,
        close: director.register_camera("Close", main, 0)?,
        drone: director.register_camera("Drone", main, -10)?,
        minimap: director.register_camera("Minimap", overlay, 0)?,
    };
    let installed = director.install_blend_rules(&config.custom_blends)?;
    tracing::info!("{} channel(s), {} custom blend(s)", config.channels.len(), installed);

    let mut track = ShotTrack::new();
    track.add_clip(ShotClip::new(rig.drone, 0.0, 1.5).with_ease(0.5, 0.0));
    track.add_clip(ShotClip::new(rig.wide, 1.0, 2.5).with_ease(0.0, 0.5));
    let mut player = ShotTrackPlayer::new(track);

    let mut time = 0.0;
    let mut frame = 0u32;
    while time < SCENE_LENGTH {
        script(&mut director, &mut player, &rig, time)?;
        animate(&mut director, &rig, time)?;

        // Game time runs at half speed in the middle of the scene
        let scaled = if (4.0..5.0).contains(&time) { TICK * 0.5 } else { TICK };
        player.update(TICK);
        player.apply(&mut director, main)?;
        director.tick(scaled, TICK);

        for event in director.take_events() {
            tracing::info!(
                "t={:.2} {}: {:?} -> {:?}{}",
                time,
                event.channel,
                event.outgoing,
                event.incoming,
                if event.is_cut { " (cut)" } else { "" }
            );
        }

        if frame % 15 == 0 {
            report(&director, main, time);
        }

        time += TICK;
        frame += 1;
    }

    player.release(&mut director)?;
    report(&director, main, time);
    Ok(())
}

fn script(
    director: &mut CameraDirector,
    player: &mut ShotTrackPlayer,
    rig: &Rig,
    time: f32,
) -> Result<(), DirectorError> {
    let crossed = |at: f32| time <= at && at < time + TICK;

    if crossed(1.0) {
        director.cameras_mut().set_priority(rig.close, 20)?;
    }
    if crossed(3.0) {
        director.set_solo(ChannelId(0), Some(rig.drone))?;
    }
    if crossed(4.0) {
        director.set_solo(ChannelId(0), None)?;
    }
    if crossed(6.0) {
        player.play();
    }
    Ok(())
}

fn animate(director: &mut CameraDirector, rig: &Rig, time: f32) -> Result<(), DirectorError> {
    let cameras = director.cameras_mut();
    cameras.set_state(rig.wide, CameraState::at([0.0, 10.0, -20.0]))?;
    cameras.set_state(rig.close, CameraState::at([time.sin() * 2.0, 1.7, -3.0]))?;
    cameras.set_state(rig.drone, CameraState::at([time * 4.0, 30.0, time.cos() * 15.0]))?;
    cameras.set_state(rig.minimap, CameraState::at([0.0, 100.0, 0.0]))?;
    Ok(())
}

fn report(director: &CameraDirector, channel: ChannelId, time: f32) {
    let Some(state) = director.blend_state(channel) else {
        return;
    };
    let diagnostics = director.diagnostics(channel).unwrap_or_default();
    tracing::info!(
        "t={:.2} camera={:?} weight={:.2} outgoing={:?} position={:?} overrides={} unresolved={}",
        time,
        state.camera,
        state.weight,
        state.outgoing_camera,
        state.camera_state.position,
        diagnostics.override_count,
        diagnostics.unresolved_blends
    );
}
