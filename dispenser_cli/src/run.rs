//! `run` and `self-check` commands.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use dispenser_config::Config;
use dispenser_core::calibration::load_constant;
use dispenser_core::{ButtonInput, Controller, ControllerCfg, EdgeSender, FileStore, edge_channel};
use dispenser_hardware::{SimulatedAnalog, SimulatedDisplay};
use dispenser_traits::{Clock, MonotonicClock, Stepper};
use eyre::WrapErr;

#[cfg(not(all(feature = "hardware", target_os = "linux")))]
use crate::script;

/// Environment variable holding the simulated volume-knob reading.
pub const SIM_ANALOG_ENV: &str = "DISPENSER_SIM_ANALOG";

#[derive(Debug, Clone, Copy)]
pub struct RunOpts {
    pub show_display: bool,
    pub max_ticks: Option<u64>,
    pub json: bool,
}

fn sim_analog_reading(cfg: &Config) -> eyre::Result<u16> {
    match std::env::var(SIM_ANALOG_ENV) {
        Ok(v) => v
            .trim()
            .parse::<u16>()
            .map_err(|e| eyre::eyre!("{SIM_ANALOG_ENV} must be an integer reading: {e}")),
        Err(_) => Ok(cfg.calibration.analog_max / 2),
    }
}

type CliController<M> = Controller<M, SimulatedDisplay, SimulatedAnalog, FileStore>;

fn build<M: Stepper>(
    cfg: &Config,
    motor: M,
    input: ButtonInput,
    clock: Arc<dyn Clock + Send + Sync>,
) -> eyre::Result<CliController<M>> {
    let analog = SimulatedAnalog::new(sim_analog_reading(cfg)?, cfg.calibration.analog_max);
    Controller::builder()
        .with_motor(motor)
        .with_display(SimulatedDisplay::new())
        .with_analog(analog)
        .with_store(FileStore::new(&cfg.store.path))
        .with_input(input)
        .with_config(ControllerCfg::from(cfg))
        .with_clock(clock)
        .build()
}

/// Run the controller loop until shutdown.
pub fn run(cfg: &Config, opts: RunOpts) -> eyre::Result<()> {
    let clock: Arc<dyn Clock + Send + Sync> = Arc::new(MonotonicClock::new());
    let core_cfg = ControllerCfg::from(cfg);
    let (edges, input) = edge_channel(core_cfg.button.thresholds, core_cfg.button.active_low, clock.clone());

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let flag = shutdown.clone();
        ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst))
            .wrap_err("install Ctrl-C handler")?;
    }

    #[cfg(all(feature = "hardware", target_os = "linux"))]
    let outcome = run_hardware(cfg, opts, edges, input, &clock, &shutdown);
    #[cfg(not(all(feature = "hardware", target_os = "linux")))]
    let outcome = run_simulated(cfg, opts, edges, input, &clock, &shutdown);
    outcome
}

#[cfg(all(feature = "hardware", target_os = "linux"))]
fn run_hardware(
    cfg: &Config,
    opts: RunOpts,
    edges: EdgeSender,
    input: ButtonInput,
    clock: &Arc<dyn Clock + Send + Sync>,
    shutdown: &Arc<AtomicBool>,
) -> eyre::Result<()> {
    use dispenser_core::hw_error::map_hw_error;
    use dispenser_hardware::gpio::{ButtonInterrupt, HardwareStepper};

    let motor = HardwareStepper::new(cfg.pins.motor_step, cfg.pins.motor_dir)
        .map_err(|e| eyre::Report::new(map_hw_error(&e)))
        .wrap_err("open motor pins")?;
    let seed = edges.clone();
    // Held until the loop ends; dropping it detaches the interrupt.
    let button = ButtonInterrupt::attach(cfg.pins.button, move |level| edges.on_level_change(level))
        .map_err(|e| eyre::Report::new(map_hw_error(&e)))
        .wrap_err("open button pin")?;
    // A button already held at startup raises no edge of its own.
    let level = button.level();
    if (level == dispenser_traits::Level::Low) == cfg.button.active_low {
        tracing::info!("button held at startup");
        seed.on_level_change(level);
    }
    let ctl = build(cfg, motor, input, clock.clone())?;
    drive(ctl, cfg, opts, clock, shutdown)
}

#[cfg(not(all(feature = "hardware", target_os = "linux")))]
fn run_simulated(
    cfg: &Config,
    opts: RunOpts,
    edges: EdgeSender,
    input: ButtonInput,
    clock: &Arc<dyn Clock + Send + Sync>,
    shutdown: &Arc<AtomicBool>,
) -> eyre::Result<()> {
    let ctl = build(cfg, dispenser_hardware::SimulatedStepper::new(), input, clock.clone())?;
    let player = spawn_script(cfg, edges, clock, shutdown);
    let result = drive(ctl, cfg, opts, clock, shutdown);
    shutdown.store(true, Ordering::SeqCst);
    // A player that raised shutdown itself is about to return; one stopped
    // by Ctrl-C or --max-ticks may still be blocked on stdin.
    for _ in 0..50 {
        if player.is_finished() {
            break;
        }
        clock.sleep(Duration::from_millis(2));
    }
    if player.is_finished() {
        match player.join() {
            Ok(r) => r?,
            Err(_) => eyre::bail!("button script thread panicked"),
        }
    }
    result
}

#[cfg(not(all(feature = "hardware", target_os = "linux")))]
fn spawn_script(
    cfg: &Config,
    edges: EdgeSender,
    clock: &Arc<dyn Clock + Send + Sync>,
    shutdown: &Arc<AtomicBool>,
) -> std::thread::JoinHandle<Result<(), script::ScriptError>> {
    let stdin = std::io::BufReader::new(std::io::stdin());
    script::spawn(
        stdin,
        script::Timing::from(&cfg.button),
        cfg.button.active_low,
        edges,
        clock.clone(),
        shutdown.clone(),
    )
}

fn drive<M: Stepper>(
    mut ctl: CliController<M>,
    cfg: &Config,
    opts: RunOpts,
    clock: &Arc<dyn Clock + Send + Sync>,
    shutdown: &AtomicBool,
) -> eyre::Result<()> {
    let period = Duration::from_micros(cfg.runner.tick_us);
    tracing::info!(tick_us = cfg.runner.tick_us, state = %ctl.state(), "controller running");

    let mut ticks = 0u64;
    let outcome = loop {
        // Read the flag before ticking so edges queued before shutdown still get handled.
        let stopping = shutdown.load(Ordering::SeqCst);
        if let Err(e) = ctl.tick() {
            break Err(e);
        }
        ticks += 1;
        if opts.show_display && ctl.display_mut().take_dirty() {
            let d = ctl.display();
            println!("lcd |{}|{}|", d.row(0), d.row(1));
        }
        if stopping || opts.max_ticks.is_some_and(|m| ticks >= m) {
            break Ok(());
        }
        clock.sleep(period);
    };

    if let Err(e) = ctl.halt_motor() {
        tracing::warn!(error = %e, "failed to stop motor on exit");
    }
    tracing::info!(ticks, state = %ctl.state(), "controller stopped");
    outcome?;
    print_summary(&ctl, opts.json);
    Ok(())
}

fn print_summary<M>(ctl: &CliController<M>, json: bool) {
    let rpm = ctl.calibration().map(|c| c.revolutions_per_ml());
    if json {
        let transitions: Vec<_> = ctl
            .recent_transitions()
            .map(|t| serde_json::json!({ "from": t.from.name(), "to": t.to.name() }))
            .collect();
        println!(
            "{}",
            serde_json::json!({
                "final_state": ctl.state().name(),
                "revolutions_per_ml": rpm,
                "transitions": transitions,
                "dropped_edges": ctl.input().dropped_edges(),
            })
        );
    } else {
        for t in ctl.recent_transitions() {
            println!("transition: {} -> {}", t.from, t.to);
        }
        println!("final state: {}", ctl.state());
        match rpm {
            Some(v) => println!("calibration: {v:.3} rev/ml"),
            None => println!("calibration: none"),
        }
    }
}

/// Validate the config end to end and report the stored calibration.
pub fn self_check(cfg: &Config, json: bool) -> eyre::Result<()> {
    let store = FileStore::new(&cfg.store.path);
    let constant = load_constant(&store)?;

    // Run the controller's own validation against the config.
    let clock: Arc<dyn Clock + Send + Sync> = Arc::new(MonotonicClock::new());
    let core_cfg = ControllerCfg::from(cfg);
    let (_edges, input) = edge_channel(core_cfg.button.thresholds, core_cfg.button.active_low, clock.clone());
    build(cfg, dispenser_hardware::SimulatedStepper::new(), input, clock)?;

    #[cfg(all(feature = "hardware", target_os = "linux"))]
    {
        dispenser_hardware::gpio::HardwareStepper::new(cfg.pins.motor_step, cfg.pins.motor_dir)
            .map_err(|e| eyre::Report::new(dispenser_core::hw_error::map_hw_error(&e)))
            .wrap_err("open motor pins")?;
    }

    let rpm = constant.map(|c| c.revolutions_per_ml());
    if json {
        println!(
            "{}",
            serde_json::json!({
                "config": "ok",
                "store": store.path().display().to_string(),
                "revolutions_per_ml": rpm,
            })
        );
    } else {
        println!("config ok");
        println!("store: {}", store.path().display());
        match rpm {
            Some(v) => println!("calibration: {v:.3} rev/ml"),
            None => println!("calibration: none"),
        }
    }
    Ok(())
}
