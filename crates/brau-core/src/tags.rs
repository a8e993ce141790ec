/// One column of the sample record, and the gauge it feeds.
#[derive(Debug, Clone, Copy)]
pub struct Tag {
    pub key: &'static str,
    pub header: &'static str,
    pub metric: &'static str,
}

pub const ELAPSED_SECONDS: Tag = Tag {
    key: "elapsed_seconds",
    header: "Time(sec)",
    metric: "brau_elapsed_seconds",
};

pub const PUMP: Tag = Tag {
    key: "pump",
    header: "Pump",
    metric: "brau_pump_on",
};

pub const MASH_HEATER: Tag = Tag {
    key: "mash_heater",
    header: "Mash_heater",
    metric: "brau_mash_heater_enabled",
};

pub const BOIL_HEATER: Tag = Tag {
    key: "boil_heater",
    header: "Boil_heater",
    metric: "brau_boil_heater_enabled",
};

pub const MASH_TEMP: Tag = Tag {
    key: "mash_temp",
    header: "Mash_temp(F)",
    metric: "brau_mash_temperature_fahrenheit",
};

pub const BOIL_TEMP: Tag = Tag {
    key: "boil_temp",
    header: "Boil_temp(F)",
    metric: "brau_boil_temperature_fahrenheit",
};

pub const HEATER_TEMP: Tag = Tag {
    key: "heater_temp",
    header: "Mash_heater_temp(F)",
    metric: "brau_heater_temperature_fahrenheit",
};

pub const BOIL_MODE: Tag = Tag {
    key: "boil_mode",
    header: "Boil_type",
    metric: "brau_boil_mode_auto",
};

pub const MASH_SETPOINT: Tag = Tag {
    key: "mash_setpoint",
    header: "Mash_setpoint(F)",
    metric: "brau_mash_setpoint_fahrenheit",
};

pub const BOIL_SETPOINT: Tag = Tag {
    key: "boil_setpoint",
    header: "Boil_setpoint(F)",
    metric: "brau_boil_setpoint_fahrenheit",
};

pub const BOIL_DC_MANUAL: Tag = Tag {
    key: "boil_dc_manual",
    header: "Boil_dutycycle_manual(%)",
    metric: "brau_boil_manual_duty_cycle_percent",
};

pub const BOIL_DC_ACTUAL: Tag = Tag {
    key: "boil_dc_actual",
    header: "Boil_dutycycle_active(%)",
    metric: "brau_boil_duty_cycle_percent",
};

pub const MASH_DC_ACTUAL: Tag = Tag {
    key: "mash_dc_actual",
    header: "Mash_dutycycle_active(%)",
    metric: "brau_mash_duty_cycle_percent",
};

pub const MASH_INTEGRAL: Tag = Tag {
    key: "mash_integral",
    header: "Mash_errorSum",
    metric: "brau_mash_error_integral",
};

pub const BOIL_INTEGRAL: Tag = Tag {
    key: "boil_integral",
    header: "Boil_errorSum",
    metric: "brau_boil_error_integral",
};

pub const OPTIMIZER_ACTIVE: Tag = Tag {
    key: "optimizer_active",
    header: "DC_opt",
    metric: "brau_optimizer_active",
};

/// Record columns in file order.
pub const RECORD_COLUMNS: [Tag; 16] = [
    ELAPSED_SECONDS,
    PUMP,
    MASH_HEATER,
    BOIL_HEATER,
    MASH_TEMP,
    BOIL_TEMP,
    HEATER_TEMP,
    BOIL_MODE,
    MASH_SETPOINT,
    BOIL_SETPOINT,
    BOIL_DC_MANUAL,
    BOIL_DC_ACTUAL,
    MASH_DC_ACTUAL,
    MASH_INTEGRAL,
    BOIL_INTEGRAL,
    OPTIMIZER_ACTIVE,
];
