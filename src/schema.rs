/// Sheet and column names of the exported statistics workbook.
/// Single source of truth - exported to Python via PyO3.

/// Sentinel used both as the literal total row key and the total column name.
pub const TOTAL: &str = "TOTAL";

// ── Sheet names ─────────────────────────────────────────────────────────────
pub mod sheet {
    pub const LEGEND: &str = "Legenda";
    pub const CURRENT: &str = "mA";
    pub const VOLTAGE: &str = "kV";
    pub const TIME: &str = "ms";
    pub const FAILURE: &str = "Falha";
    pub const WARNING: &str = "Warning";
    pub const EXPOSURE: &str = "Exposição";

    pub const PARAMETERS: [&str; 6] = [CURRENT, VOLTAGE, TIME, FAILURE, WARNING, EXPOSURE];
}

// ── Legend columns ──────────────────────────────────────────────────────────
pub mod legend {
    pub const NAME: &str = "Arquivo";
}

// ── Exposure metadata columns ───────────────────────────────────────────────
pub mod exposure {
    pub const CHARGE: &str = "mAs";
    pub const POWER: &str = "kW";
    pub const ENERGY: &str = "kJ";
    pub const CURRENT_GAIN: &str = "Ganho mA";
    pub const INDUCTOR: &str = "Indutor";

    pub const METADATA: [&str; 5] = [CHARGE, POWER, ENERGY, CURRENT_GAIN, INDUCTOR];
}

// ── Log history event columns ───────────────────────────────────────────────
pub mod history {
    pub const FAILURE: &str = "Falha";
    pub const WARNING: &str = "Warning";
}

// ── Valid values ────────────────────────────────────────────────────────────
pub mod valid {
    pub const CURRENT_SETTINGS: [f64; 14] = [
        10.0, 50.0, 100.0, 125.0, 160.0, 220.0, 280.0, 320.0, 360.0, 400.0, 450.0, 500.0, 630.0,
        800.0,
    ];
    pub const VOLTAGE_RANGE: (f64, f64) = (40.0, 150.0);
    pub const TIME_RANGE: (f64, f64) = (1.0, 5000.0);
}
