use blastfrag_core::domain::X50Mode;
use blastfrag_core::params::ParameterValue;
use blastfrag_core::reference::AxisKind;

pub(super) const X50_MODE_OPTIONS: [(&str, X50Mode); 2] = [
    ("iterative", X50Mode::Iterative),
    ("direct", X50Mode::Direct),
];

pub(super) const AXIS_OPTIONS: [(&str, AxisKind); 3] = [
    ("sieve", AxisKind::Sieve),
    ("log", AxisKind::Logarithmic),
    ("linear", AxisKind::Linear),
];

pub(super) fn parse_x50_mode(token: &str) -> Result<X50Mode, String> {
    X50_MODE_OPTIONS
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(token.trim()))
        .map(|(_, mode)| *mode)
        .ok_or_else(|| {
            format!(
                "unknown x_50 mode '{token}'; expected one of: {}",
                option_names(&X50_MODE_OPTIONS)
            )
        })
}

pub(super) fn parse_axis_kind(token: &str) -> Result<AxisKind, String> {
    AxisKind::parse(token).ok_or_else(|| {
        format!(
            "unknown axis '{token}'; expected one of: {}",
            option_names(&AXIS_OPTIONS)
        )
    })
}

/// `name=value`; numbers become numeric values, anything else is kept as text.
pub(super) fn parse_override(token: &str) -> Result<(String, ParameterValue), String> {
    let (name, value) = token
        .split_once('=')
        .ok_or_else(|| format!("override '{token}' must have the form name=value"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("override '{token}' has an empty parameter name"));
    }
    Ok((name.to_string(), ParameterValue::parse(value)))
}

fn option_names<T>(options: &[(&str, T)]) -> String {
    options
        .iter()
        .map(|(name, _)| *name)
        .collect::<Vec<_>>()
        .join(", ")
}
