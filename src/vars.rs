use crate::store::Section;

/// Flag the runner uses for extra variables.
pub const EXTRA_VAR_FLAG: &str = "-e";

/// Build `-e key=value` tokens for every option of every section, keeping
/// section order and option order. Keys repeated across sections are emitted
/// once per section; the runner applies the last one.
pub fn extra_vars(sections: &[&Section]) -> Vec<String> {
    sections
        .iter()
        .flat_map(|section| section.iter())
        .flat_map(|(key, value)| [EXTRA_VAR_FLAG.to_string(), format!("{key}={value}")])
        .collect()
}
