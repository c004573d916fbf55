mod host;
mod link;
mod physics;

use anyhow::Result;
use clap::Parser;
use glam::Vec3;

use rewind::{
    DEFAULT_TICK_RATE, ObserverConfig, ObserverInterpolator, Predictable, PredictionConfig,
    PredictionWorld, ReconcileAction, StateSender, SyncMessage,
};

use host::{HostBody, MovementScript};
use link::{LinkConfig, LossyLink};

const ENTITY_ID: u32 = 1;

#[derive(Parser)]
#[command(name = "rewind-demo")]
#[command(about = "Headless prediction/reconciliation run over a lossy link")]
struct Args {
    #[arg(long, default_value_t = 600)]
    ticks: u64,

    #[arg(long, default_value_t = 5.0, help = "Packet loss percentage (0-100)")]
    loss_percent: f32,

    #[arg(long, default_value_t = 2)]
    min_latency_ticks: u64,

    #[arg(long, default_value_t = 6)]
    max_latency_ticks: u64,

    #[arg(
        long,
        default_value_t = 0.2,
        help = "Client velocity bias in m/s, the source of drift"
    )]
    divergence: f32,

    #[arg(long, default_value_t = 7)]
    seed: u64,
}

#[derive(Default)]
struct RunStats {
    updates_received: u64,
    ignored: u64,
    snapped: u64,
    replayed: u64,
    replayed_ticks: u64,
    error_sum: f32,
    max_error: f32,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    run(&args)
}

fn run(args: &Args) -> Result<()> {
    let config = PredictionConfig::default();
    let dt = 1.0 / DEFAULT_TICK_RATE as f32;
    let spawn = Vec3::new(0.0, 0.5, 0.0);
    let script = MovementScript {
        speed: 3.0,
        idle_from: args.ticks / 3,
        idle_until: args.ticks / 2,
    };

    // Authoritative side.
    let mut server = HostBody::new(spawn, script.clone(), Vec3::ZERO, DEFAULT_TICK_RATE);
    let mut sender = StateSender::new(&config);

    // Predicting client: same script, plus a bias that makes it drift.
    let mut world = PredictionWorld::new(config);
    world.register(
        ENTITY_ID,
        HostBody::new(
            spawn,
            script.clone(),
            Vec3::new(args.divergence, 0.0, 0.0),
            DEFAULT_TICK_RATE,
        ),
    );

    // Non-owning observer.
    let mut observer = ObserverInterpolator::new(ObserverConfig {
        seconds_per_tick: dt,
        ..Default::default()
    });

    let mut owner_link = LossyLink::new(LinkConfig {
        loss_percent: args.loss_percent,
        min_latency_ticks: args.min_latency_ticks,
        max_latency_ticks: args.max_latency_ticks,
        seed: args.seed,
    });
    let mut observer_link = LossyLink::new(LinkConfig {
        loss_percent: args.loss_percent,
        min_latency_ticks: args.min_latency_ticks,
        max_latency_ticks: args.max_latency_ticks,
        seed: args.seed.wrapping_add(1),
    });

    let teleport_tick = args.ticks * 2 / 3;
    let mut stats = RunStats::default();
    let mut observer_error_sum = 0.0f32;
    let mut observer_samples = 0u32;

    for tick in 1..=args.ticks {
        if tick == teleport_tick {
            server.teleport(server.position() + Vec3::new(0.0, 0.0, 10.0));
            sender.request_force_replay();
            log::info!("tick {}: teleport issued, forcing replay", tick);
        } else if let Err(err) = server.step_tick(tick) {
            log::error!("server step failed at tick {}: {}", tick, err);
        }

        let server_state = server.current_state();
        if let Some(state) = sender.poll_authoritative(tick, &server_state) {
            let message = SyncMessage::Authoritative {
                entity_id: ENTITY_ID,
                state,
            };
            owner_link.send(tick, message.serialize()?);
        }
        if let Some(snapshot) = sender.poll_observer(tick, &server_state) {
            let message = SyncMessage::Observer {
                entity_id: ENTITY_ID,
                snapshot,
            };
            observer_link.send(tick, message.serialize()?);
        }

        // Client predicts ahead locally.
        if let Some(entity) = world.entity_mut(ENTITY_ID) {
            if let Err(err) = entity.step_tick(tick) {
                log::error!("client step failed at tick {}: {}", tick, err);
            }
        }
        world.record_predicted(ENTITY_ID, tick);

        for bytes in owner_link.take_due(tick) {
            let message = match SyncMessage::deserialize(&bytes) {
                Ok(message) => message,
                Err(err) => {
                    log::warn!("discarding corrupt message: {}", err);
                    continue;
                }
            };
            let SyncMessage::Authoritative { entity_id, state } = message else {
                continue;
            };

            stats.updates_received += 1;
            if let Some(entity) = world.entity(entity_id) {
                let error = (state.body().position - entity.position()).length();
                stats.error_sum += error;
                stats.max_error = stats.max_error.max(error);
            }

            match world.apply_authoritative(entity_id, state.to_update()) {
                ReconcileAction::Replayed { ticks } => {
                    stats.replayed += 1;
                    stats.replayed_ticks += ticks;
                    log::debug!("tick {}: replayed {} ticks", tick, ticks);
                }
                ReconcileAction::Snapped => {
                    stats.snapped += 1;
                    log::debug!("tick {}: hard snap", tick);
                }
                ReconcileAction::Ignored(_) => stats.ignored += 1,
                ReconcileAction::UnknownEntity => {}
            }
        }

        for bytes in observer_link.take_due(tick) {
            if let Ok(SyncMessage::Observer { snapshot, .. }) = SyncMessage::deserialize(&bytes) {
                observer.push_snapshot(snapshot);
            }
        }
        observer.advance(dt);
        if let Some(view) = observer.sample() {
            observer_error_sum += (view.position - server_state.position).length();
            observer_samples += 1;
        }
    }

    let final_error = world
        .entity(ENTITY_ID)
        .map(|entity| (entity.position() - server.position()).length())
        .unwrap_or(f32::NAN);

    println!("ticks simulated            {}", args.ticks);
    println!(
        "messages sent / dropped    {} / {}",
        owner_link.sent + observer_link.sent,
        owner_link.dropped + observer_link.dropped
    );
    println!("updates received           {}", stats.updates_received);
    println!(
        "ignored / snaps / replays  {} / {} / {}",
        stats.ignored, stats.snapped, stats.replayed
    );
    println!("ticks re-simulated         {}", stats.replayed_ticks);
    if stats.updates_received > 0 {
        println!(
            "mean / max divergence      {:.3} / {:.3} m",
            stats.error_sum / stats.updates_received as f32,
            stats.max_error
        );
    }
    if observer_samples > 0 {
        println!(
            "observer mean error        {:.3} m",
            observer_error_sum / observer_samples as f32
        );
    }
    println!("final position error       {:.3} m", final_error);

    Ok(())
}
