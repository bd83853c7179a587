use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use ecu_core::clock::TickMs;
use ecu_core::config::{EcuConfig, Field};
use ecu_core::console::{self, ConfigStore, Reply, StoreError};
use ecu_core::engine::{CycleInputs, Ecu, FixedCorrection};
use ecu_core::pwm::{EngineOutputs, PwmChannel};
use ecu_core::telemetry::{self, EventLog, ReportScheduler, StatusReport};

/// Simulated control period, matching the firmware loop.
const CONTROL_PERIOD_MS: u64 = 20;

/// Where `config save` lands on the host.
const CONFIG_SAVE_PATH: &str = "ecu-emulator.cfg";

/// Starter-driven cranking speed.
const CRANK_RPM: f32 = 600.0;
/// Minimum speed at which a live ignition catches.
const FIRE_RPM: f32 = 400.0;
/// Closed-throttle running speed.
const IDLE_RPM: f32 = 1_500.0;
/// Speed gained between closed and full throttle.
const THROTTLE_SPAN_RPM: f32 = 7_500.0;
/// First-order lag applied per simulation step.
const SPIN_GAIN: f32 = 0.2;

pub const HELP_TOPICS: &[(&str, &str)] = &[
    (
        "step",
        "step <ms>                    - advance the simulation clock",
    ),
    (
        "throttle",
        "throttle <us>                - set the throttle input pulse width",
    ),
    (
        "rpm",
        "rpm <value|auto>             - force the tach reading or return to the model",
    ),
    (
        "status",
        "status                       - print the current status report",
    ),
    (
        "events",
        "events                       - dump the retained lifecycle events",
    ),
    (
        "config",
        "config [defaults|save]       - show, reset, or persist the configuration",
    ),
    (
        "period",
        "period <ms>                  - change the status report period",
    ),
    (
        "get",
        "get <field>                  - show one configuration field",
    ),
    (
        "set",
        "set <field> <value>          - update one configuration field",
    ),
    (
        "help",
        "help [topic]                 - show help for a command",
    ),
];

/// Engine plant model: consumes the core's PWM and switch outputs and spins a
/// first-order rotor in response.
struct SimulatedEngine {
    ignition: bool,
    pump: bool,
    duty: [u16; 2],
    rpm: f32,
}

impl SimulatedEngine {
    fn new(config: &EcuConfig) -> Self {
        Self {
            ignition: false,
            pump: false,
            duty: [config.pwm0_min, config.pwm1_min],
            rpm: 0.0,
        }
    }

    fn duty(&self, channel: PwmChannel) -> u16 {
        self.duty[channel.as_index()]
    }

    /// Throttle opening recovered from the actuator pulse; correct for both
    /// servo orientations.
    fn throttle_fraction(&self, config: &EcuConfig) -> f32 {
        let lo = f32::from(config.pwm0_min);
        let hi = f32::from(config.pwm0_max);
        if (hi - lo).abs() < f32::EPSILON {
            return 0.0;
        }
        ((f32::from(self.duty(PwmChannel::Throttle)) - lo) / (hi - lo)).clamp(0.0, 1.0)
    }

    fn starter_engaged(&self, config: &EcuConfig) -> bool {
        let lo = config.pwm1_min.min(config.pwm1_max);
        let hi = config.pwm1_min.max(config.pwm1_max);
        u32::from(self.duty(PwmChannel::Crank)) * 2 >= u32::from(lo) + u32::from(hi)
    }

    /// Advances the rotor one control period and returns the tach reading.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn step(&mut self, config: &EcuConfig) -> u16 {
        let target = if self.ignition && self.pump && self.rpm >= FIRE_RPM {
            IDLE_RPM + self.throttle_fraction(config) * THROTTLE_SPAN_RPM
        } else if self.starter_engaged(config) {
            CRANK_RPM
        } else {
            0.0
        };

        self.rpm += (target - self.rpm) * SPIN_GAIN;
        if self.rpm < 1.0 && target == 0.0 {
            self.rpm = 0.0;
        }
        self.rpm as u16
    }
}

impl EngineOutputs for SimulatedEngine {
    fn set_pwm(&mut self, channel: PwmChannel, duty: u16) {
        self.duty[channel.as_index()] = duty;
    }

    fn ignition(&mut self, enabled: bool) {
        self.ignition = enabled;
    }

    fn fuel_pump(&mut self, enabled: bool) {
        self.pump = enabled;
    }
}

/// `config save` target backed by a host file of `name=value` lines.
struct HostConfigStore {
    path: PathBuf,
}

impl ConfigStore for HostConfigStore {
    fn save(&mut self, config: &EcuConfig) -> Result<(), StoreError> {
        let mut contents = String::new();
        for field in Field::ALL {
            contents.push_str(field.name());
            contents.push('=');
            contents.push_str(&config.get(field).to_string());
            contents.push('\n');
        }
        fs::write(&self.path, contents).map_err(|_| StoreError)
    }
}

pub struct Session {
    config: EcuConfig,
    ecu: Ecu,
    scheduler: ReportScheduler,
    events: EventLog,
    engine: SimulatedEngine,
    injection: FixedCorrection,
    store: HostConfigStore,
    transcript: Option<TranscriptLogger>,
    /// Monotonic simulation clock; the core sees its low 16 bits.
    total_ms: u64,
    throttle_us: u16,
    forced_rpm: Option<u16>,
}

impl Session {
    pub fn new(transcript: Option<PathBuf>) -> io::Result<Self> {
        let transcript = transcript.map(TranscriptLogger::new).transpose()?;
        let config = EcuConfig::default();
        let ecu = Ecu::new(&config, 0);
        let engine = SimulatedEngine::new(&config);

        Ok(Self {
            config,
            ecu,
            scheduler: ReportScheduler::new(0),
            events: EventLog::new(),
            engine,
            injection: FixedCorrection(1.0),
            store: HostConfigStore {
                path: PathBuf::from(CONFIG_SAVE_PATH),
            },
            transcript,
            total_ms: 0,
            throttle_us: 0,
            forced_rpm: None,
        })
    }

    pub fn handle_command(&mut self, line: &str) -> io::Result<Vec<String>> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }

        self.record(TranscriptRole::Host, trimmed)?;

        let mut tokens = trimmed.split_whitespace();
        let verb = tokens.next().unwrap_or_default();
        let lines = match verb {
            "help" => self.handle_help(tokens.next()),
            "step" => self.handle_step(tokens.next()),
            "throttle" => self.handle_throttle(tokens.next()),
            "rpm" => self.handle_rpm(tokens.next()),
            "status" => self.handle_status(),
            "events" => self.handle_events(),
            _ => self.handle_console_line(trimmed),
        };

        for line in &lines {
            self.record(TranscriptRole::Emulator, line)?;
        }
        Ok(lines)
    }

    fn handle_help(&self, topic: Option<&str>) -> Vec<String> {
        let mut lines = Vec::new();
        match topic {
            Some(target) if !target.is_empty() => {
                if let Some((_, detail)) = HELP_TOPICS
                    .iter()
                    .find(|(name, _)| name.eq_ignore_ascii_case(target))
                {
                    lines.push((*detail).to_string());
                } else {
                    lines.push(format!("No help available for `{target}`."));
                    lines.push(format!("Available topics: {}", help_topic_list()));
                }
            }
            _ => {
                lines.push("Available commands:".to_string());
                for (_, detail) in HELP_TOPICS {
                    lines.push(format!("  {detail}"));
                }
                lines.push("Type `help <topic>` for a specific command.".to_string());
            }
        }
        lines
    }

    fn handle_step(&mut self, argument: Option<&str>) -> Vec<String> {
        let Some(duration_ms) = argument.and_then(|value| value.parse::<u64>().ok()) else {
            return vec!["ERR usage: step <ms>".to_string()];
        };

        let cycles = duration_ms.div_ceil(CONTROL_PERIOD_MS).max(1);
        let mut lines = Vec::new();
        for _ in 0..cycles {
            self.run_cycle(&mut lines);
        }
        lines.push(format!("t=+{}ms", self.total_ms));
        lines
    }

    fn handle_throttle(&mut self, argument: Option<&str>) -> Vec<String> {
        let Some(pulse_us) = argument.and_then(|value| value.parse::<u16>().ok()) else {
            return vec!["ERR usage: throttle <us>".to_string()];
        };
        self.throttle_us = pulse_us;
        vec![format!("throttle input {pulse_us}us")]
    }

    fn handle_rpm(&mut self, argument: Option<&str>) -> Vec<String> {
        match argument {
            Some("auto") => {
                self.forced_rpm = None;
                vec!["tach follows the engine model".to_string()]
            }
            Some(value) => match value.parse::<u16>() {
                Ok(rpm) => {
                    self.forced_rpm = Some(rpm);
                    self.engine.rpm = f32::from(rpm);
                    vec![format!("tach forced to {rpm} rpm")]
                }
                Err(_) => vec!["ERR usage: rpm <value|auto>".to_string()],
            },
            None => vec!["ERR usage: rpm <value|auto>".to_string()],
        }
    }

    fn handle_status(&self) -> Vec<String> {
        let mut lines = render_report(&StatusReport::capture(self.ecu.status()));
        lines.push(format!(
            "sim: t=+{}ms ignition={} pump={} model_rpm={}",
            self.total_ms,
            self.engine.ignition,
            self.engine.pump,
            self.engine.rpm as u16,
        ));
        lines
    }

    fn handle_events(&self) -> Vec<String> {
        if self.events.is_empty() {
            return vec!["no events recorded".to_string()];
        }
        self.events
            .oldest_first()
            .map(|record| format!("[{}ms] {}", record.at_ms, record.event.label()))
            .collect()
    }

    fn handle_console_line(&mut self, line: &str) -> Vec<String> {
        match console::parse_line(line) {
            Ok(command) => match console::execute(
                command,
                &mut self.config,
                &mut self.scheduler,
                &mut self.store,
            ) {
                Ok(reply) => render_reply(&reply),
                Err(error) => vec![format!("ERR {error}")],
            },
            Err(error) => vec![format!("ERR syntax {error}")],
        }
    }

    fn run_cycle(&mut self, lines: &mut Vec<String>) {
        self.total_ms += CONTROL_PERIOD_MS;
        let now = (self.total_ms & 0xFFFF) as TickMs;

        let model_rpm = self.engine.step(&self.config);
        let rpm = self.forced_rpm.unwrap_or(model_rpm);
        let inputs = CycleInputs {
            now_ms: now,
            rpm,
            thr_in: self.throttle_us,
        };

        for event in self
            .ecu
            .cycle(&self.config, inputs, &mut self.engine, &mut self.injection)
        {
            self.events.record(now, event);
            lines.push(format!("[{now}ms] {}", event.label()));
        }

        if self.scheduler.due(now) {
            lines.extend(render_report(&StatusReport::capture(self.ecu.status())));
        }
    }

    fn record(&mut self, role: TranscriptRole, line: &str) -> io::Result<()> {
        if let Some(transcript) = self.transcript.as_mut() {
            transcript.append_line(self.total_ms, role, line)?;
        }
        Ok(())
    }
}

fn render_report(report: &StatusReport) -> Vec<String> {
    telemetry::format_report(report)
        .iter()
        .map(|line| line.as_str().to_string())
        .collect()
}

fn render_reply(reply: &Reply) -> Vec<String> {
    telemetry::format_reply(reply)
        .iter()
        .map(|line| line.as_str().to_string())
        .collect()
}

fn help_topic_list() -> String {
    let mut buffer = String::new();
    for (index, (name, _)) in HELP_TOPICS.iter().enumerate() {
        if index > 0 {
            buffer.push_str(", ");
        }
        buffer.push_str(name);
    }
    buffer
}

struct TranscriptLogger {
    writer: BufWriter<std::fs::File>,
}

impl TranscriptLogger {
    fn new(path: PathBuf) -> io::Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        let mut logger = Self {
            writer: BufWriter::new(file),
        };
        logger.write_header()?;
        Ok(logger)
    }

    fn write_header(&mut self) -> io::Result<()> {
        writeln!(self.writer, "# ECU Emulator session transcript")?;
        writeln!(
            self.writer,
            "# Timestamps are simulated milliseconds since session start"
        )?;
        writeln!(self.writer)?;
        self.writer.flush()
    }

    fn append_line(&mut self, at_ms: u64, role: TranscriptRole, line: &str) -> io::Result<()> {
        writeln!(self.writer, "[+{at_ms:>6} ms] {} {line}", role.prefix())?;
        self.writer.flush()
    }
}

#[derive(Copy, Clone)]
enum TranscriptRole {
    Host,
    Emulator,
}

impl TranscriptRole {
    fn prefix(self) -> &'static str {
        match self {
            TranscriptRole::Host => "HOST>",
            TranscriptRole::Emulator => "EMU <",
        }
    }
}
