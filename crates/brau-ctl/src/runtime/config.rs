use brau_core::ControlConfig;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub show_help: bool,
    pub run_seconds: Option<u64>,
    pub period_ms: u64,
    pub log_interval_ms: u64,
    pub log_dir: PathBuf,
    pub logging: bool,
    pub pump: bool,
    pub mash: bool,
    pub boil: bool,
    pub boil_auto: bool,
    pub mash_setpoint: Option<f64>,
    pub boil_setpoint: Option<f64>,
    pub boil_duty: Option<f64>,
    pub mash_weight_pct: Option<f64>,
    pub console_enabled: bool,
    pub json_logs: bool,
    pub trace_file: Option<PathBuf>,
    pub metrics_addr: Option<String>,
    pub audit_path: Option<PathBuf>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            show_help: false,
            run_seconds: None,
            period_ms: 500,
            log_interval_ms: 1000,
            log_dir: PathBuf::from("."),
            logging: false,
            pump: false,
            mash: false,
            boil: false,
            boil_auto: false,
            mash_setpoint: None,
            boil_setpoint: None,
            boil_duty: None,
            mash_weight_pct: None,
            console_enabled: true,
            json_logs: false,
            trace_file: None,
            metrics_addr: None,
            audit_path: None,
        }
    }
}

impl RuntimeConfig {
    pub fn from_env() -> Self {
        let args: Vec<String> = std::env::args().collect();
        Self::from_args(&args)
    }

    pub fn from_args(args: &[String]) -> Self {
        let mut cfg = RuntimeConfig::default();
        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--run-seconds" => {
                    if i + 1 < args.len() {
                        cfg.run_seconds = args[i + 1].parse::<u64>().ok();
                        i += 1;
                    }
                }
                "--period-ms" => {
                    if i + 1 < args.len() {
                        cfg.period_ms = args[i + 1].parse().unwrap_or(500).max(1);
                        i += 1;
                    }
                }
                "--log-interval-ms" => {
                    if i + 1 < args.len() {
                        cfg.log_interval_ms = args[i + 1].parse().unwrap_or(1000).max(1);
                        i += 1;
                    }
                }
                "--log-dir" => {
                    if i + 1 < args.len() {
                        cfg.log_dir = PathBuf::from(&args[i + 1]);
                        i += 1;
                    }
                }
                "--log" => {
                    cfg.logging = true;
                }
                "--pump" => {
                    cfg.pump = true;
                }
                "--mash" => {
                    cfg.pump = true;
                    cfg.mash = true;
                }
                "--boil" => {
                    cfg.boil = true;
                }
                "--boil-auto" => {
                    cfg.boil_auto = true;
                }
                "--mash-setpoint" => {
                    if i + 1 < args.len() {
                        cfg.mash_setpoint = args[i + 1].parse().ok();
                        i += 1;
                    }
                }
                "--boil-setpoint" => {
                    if i + 1 < args.len() {
                        cfg.boil_setpoint = args[i + 1].parse().ok();
                        i += 1;
                    }
                }
                "--boil-duty" => {
                    if i + 1 < args.len() {
                        cfg.boil_duty = args[i + 1].parse().ok();
                        i += 1;
                    }
                }
                "--mash-weight" => {
                    if i + 1 < args.len() {
                        cfg.mash_weight_pct = args[i + 1].parse().ok();
                        i += 1;
                    }
                }
                "--no-console" => {
                    cfg.console_enabled = false;
                }
                "--json-logs" => {
                    cfg.json_logs = true;
                }
                "--trace-file" => {
                    if i + 1 < args.len() {
                        cfg.trace_file = Some(PathBuf::from(&args[i + 1]));
                        i += 1;
                    }
                }
                "--metrics-addr" => {
                    if i + 1 < args.len() {
                        cfg.metrics_addr = Some(args[i + 1].clone());
                        i += 1;
                    }
                }
                "--audit-log" => {
                    if i + 1 < args.len() {
                        cfg.audit_path = Some(PathBuf::from(&args[i + 1]));
                        i += 1;
                    }
                }
                "--help" | "-h" => {
                    cfg.show_help = true;
                    break;
                }
                _ => {}
            }
            i += 1;
        }
        cfg
    }

    /// Control parameters with the command-line overrides applied. Staged
    /// inputs are range-checked when the controller commits them.
    pub fn control_config(&self) -> ControlConfig {
        let mut control = ControlConfig {
            period: Duration::from_millis(self.period_ms),
            log_interval: Duration::from_millis(self.log_interval_ms),
            ..ControlConfig::default()
        };
        let inputs = &mut control.initial_inputs;
        if let Some(value) = self.mash_setpoint {
            inputs.mash_setpoint = value;
        }
        if let Some(value) = self.boil_setpoint {
            inputs.boil_setpoint = value;
        }
        if let Some(value) = self.boil_duty {
            inputs.manual_duty_cycle = value;
        }
        if let Some(value) = self.mash_weight_pct {
            inputs.mash_weight_pct = value;
        }
        control
    }

    pub fn print_help() {
        println!(
            r#"brauctl - Dual-vessel brewing heater controller (RIMS mash + boil kettle)

USAGE:
    brauctl [OPTIONS]

OPTIONS:
    --run-seconds <SECS>    Run for a fixed duration then exit
    --period-ms <MS>        Control period in milliseconds [default: 500]
    --log-interval-ms <MS>  Sample log interval in milliseconds [default: 1000]
    --log-dir <PATH>        Directory for sample log files [default: .]
    --log                   Start sample logging immediately
    --pump                  Start the pump after connecting
    --mash                  Enable the mash heater (implies --pump)
    --boil                  Enable the boil heater
    --boil-auto             Run the boil heater in auto (PI) mode
    --mash-setpoint <F>     Initial mash setpoint in °F [default: 154]
    --boil-setpoint <F>     Initial boil setpoint in °F [default: 170]
    --boil-duty <PCT>       Initial manual boil duty cycle in percent [default: 0]
    --mash-weight <PCT>     Optimizer mash weight in percent [default: 50]
    --no-console            Do not read JSON commands from stdin
    --json-logs             Output logs in JSON format (for log aggregation)
    --trace-file <PATH>     Also write JSON logs to a file
    --metrics-addr <ADDR>   Enable Prometheus metrics server on address (e.g., 0.0.0.0:9090)
    --audit-log <PATH>      Enable audit logging to specified JSONL file
    -h, --help              Print this help message

CONSOLE:
    One JSON object per line on stdin, for example:
    {{"type":"set_pump","on":true}}
    {{"type":"set_enabled","vessel":"mash","enabled":true}}
    {{"type":"set_mode","mode":"auto"}}
    {{"type":"set_setpoint","vessel":"boil","value":212}}
    {{"type":"adjust","input":"mash_setpoint","delta":-1}}
    {{"type":"apply_inputs"}}
    {{"type":"status"}}
    {{"type":"quit"}}

ENVIRONMENT VARIABLES:
    RUST_LOG                Set log filter (e.g., RUST_LOG=debug,brau_core=trace)

EXAMPLES:
    # Mash at 152 °F with logging
    brauctl --mash --mash-setpoint 152 --log --log-dir ./logs

    # Boil at full power with metrics and an audit trail
    brauctl --boil --boil-duty 100 --metrics-addr 0.0.0.0:9090 --audit-log ./audit.jsonl

    # Short unattended run
    brauctl --run-seconds 10 --no-console --boil --boil-duty 40
"#
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        std::iter::once("brauctl")
            .chain(list.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn defaults_match_the_panel() {
        let cfg = RuntimeConfig::from_args(&args(&[]));
        assert!(cfg.console_enabled);
        assert!(!cfg.logging);
        let control = cfg.control_config();
        assert_eq!(control.period, Duration::from_millis(500));
        assert_eq!(control.log_interval, Duration::from_secs(1));
        assert_eq!(control.initial_inputs.mash_setpoint, 154.0);
        assert_eq!(control.initial_inputs.boil_setpoint, 170.0);
    }

    #[test]
    fn parses_run_flags_and_overrides() {
        let cfg = RuntimeConfig::from_args(&args(&[
            "--run-seconds",
            "3",
            "--period-ms",
            "100",
            "--mash",
            "--boil-auto",
            "--boil-setpoint",
            "212",
            "--mash-weight",
            "70",
            "--log",
            "--log-dir",
            "/tmp/brau",
            "--no-console",
        ]));
        assert_eq!(cfg.run_seconds, Some(3));
        assert!(cfg.pump && cfg.mash && cfg.boil_auto && cfg.logging);
        assert!(!cfg.console_enabled);
        assert_eq!(cfg.log_dir, PathBuf::from("/tmp/brau"));
        let control = cfg.control_config();
        assert_eq!(control.period, Duration::from_millis(100));
        assert_eq!(control.initial_inputs.boil_setpoint, 212.0);
        assert_eq!(control.initial_inputs.mash_weight_pct, 70.0);
    }

    #[test]
    fn help_stops_parsing() {
        let cfg = RuntimeConfig::from_args(&args(&["-h", "--log"]));
        assert!(cfg.show_help);
        assert!(!cfg.logging);
    }

    #[test]
    fn unparsable_numbers_fall_back() {
        let cfg = RuntimeConfig::from_args(&args(&["--period-ms", "fast", "--boil-duty", "lots"]));
        assert_eq!(cfg.period_ms, 500);
        assert_eq!(cfg.boil_duty, None);
    }
}
