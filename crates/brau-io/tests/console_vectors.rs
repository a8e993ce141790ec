use brau_core::{BoilMode, InputField, Vessel};
use brau_io::console::{ConsoleCommand, ConsoleError};

#[test]
fn parses_set_enabled_command() {
    let raw = r#"{"type":"set_enabled","vessel":"boil","enabled":true}"#;

    let cmd = ConsoleCommand::parse(raw).expect("set_enabled should parse");
    match cmd {
        ConsoleCommand::SetEnabled(msg) => {
            assert_eq!(msg.vessel, Vessel::Boil);
            assert!(msg.enabled);
        }
        _ => panic!("expected set_enabled command"),
    }
}

#[test]
fn parses_set_mode_command() {
    let raw = r#"{"type":"set_mode","mode":"auto"}"#;

    match ConsoleCommand::parse(raw).expect("set_mode should parse") {
        ConsoleCommand::SetMode(msg) => assert_eq!(msg.mode, BoilMode::Auto),
        _ => panic!("expected set_mode command"),
    }
}

#[test]
fn parses_setpoint_and_adjust_commands() {
    let raw = r#"{"type":"set_setpoint","vessel":"mash","value":152.5}"#;
    match ConsoleCommand::parse(raw).expect("set_setpoint should parse") {
        ConsoleCommand::SetSetpoint(msg) => {
            assert_eq!(msg.vessel, Vessel::Mash);
            assert_eq!(msg.value, 152.5);
        }
        _ => panic!("expected set_setpoint command"),
    }

    let raw = r#"{"type":"adjust","input":"manual_duty_cycle","delta":-10}"#;
    match ConsoleCommand::parse(raw).expect("adjust should parse") {
        ConsoleCommand::Adjust(msg) => {
            assert_eq!(msg.input, InputField::ManualDutyCycle);
            assert_eq!(msg.delta, -10.0);
        }
        _ => panic!("expected adjust command"),
    }
}

#[test]
fn parses_argumentless_commands() {
    for (raw, name) in [
        (r#"{"type":"connect"}"#, "connect"),
        (r#"{"type":"disconnect"}"#, "disconnect"),
        (r#"{"type":"apply_inputs"}"#, "apply_inputs"),
        (r#"{"type":"status"}"#, "status"),
        (r#"{"type":"quit"}"#, "quit"),
    ] {
        let cmd = ConsoleCommand::parse(raw).expect("command should parse");
        assert_eq!(cmd.name(), name);
    }
}

#[test]
fn rejects_unknown_and_malformed_lines() {
    assert!(matches!(
        ConsoleCommand::parse(r#"{"type":"vent"}"#),
        Err(ConsoleError::UnknownType(t)) if t == "vent"
    ));
    assert!(matches!(
        ConsoleCommand::parse(r#"{"on":true}"#),
        Err(ConsoleError::MissingType)
    ));
    assert!(matches!(
        ConsoleCommand::parse("set_pump on"),
        Err(ConsoleError::Json(_))
    ));
    assert!(matches!(
        ConsoleCommand::parse(r#"{"type":"set_enabled","vessel":"hlt","enabled":true}"#),
        Err(ConsoleError::Json(_))
    ));
}
