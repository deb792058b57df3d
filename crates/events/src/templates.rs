//! Embedded notification templates rendered with minijinja.
//!
//! Templates live in `crates/events/templates/*.txt` and are compiled into
//! the binary. Missing context keys render as empty strings.

use std::sync::LazyLock;

use minijinja::Environment;

/// Template ids accepted in [`EmailMessage::template`](crate::EmailMessage).
pub mod ids {
    pub const CLUSTER_ACCESS_ACTIVATED: &str = "cluster_access_activated";
    pub const CLUSTER_ACCESS_DENIED: &str = "cluster_access_denied";
    pub const ALLOCATION_CHANGE_APPROVED: &str = "allocation_change_approved";
    pub const ALLOCATION_CHANGE_DENIED: &str = "allocation_change_denied";
    pub const ALLOCATION_EXPIRED: &str = "allocation_expired";
}

const SOURCES: &[(&str, &str)] = &[
    (
        ids::CLUSTER_ACCESS_ACTIVATED,
        include_str!("../templates/cluster_access_activated.txt"),
    ),
    (
        ids::CLUSTER_ACCESS_DENIED,
        include_str!("../templates/cluster_access_denied.txt"),
    ),
    (
        ids::ALLOCATION_CHANGE_APPROVED,
        include_str!("../templates/allocation_change_approved.txt"),
    ),
    (
        ids::ALLOCATION_CHANGE_DENIED,
        include_str!("../templates/allocation_change_denied.txt"),
    ),
    (
        ids::ALLOCATION_EXPIRED,
        include_str!("../templates/allocation_expired.txt"),
    ),
];

#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("Unknown email template: {0}")]
    Unknown(String),

    #[error("Template load error: {0}")]
    Load(String),

    #[error("Template render error: {0}")]
    Render(#[from] minijinja::Error),
}

static ENV: LazyLock<Result<Environment<'static>, String>> = LazyLock::new(|| {
    let mut env = Environment::new();
    for (name, source) in SOURCES {
        env.add_template(name, source)
            .map_err(|e| format!("{name}: {e}"))?;
    }
    Ok(env)
});

/// Render template `name` with a JSON context.
pub fn render(name: &str, context: &serde_json::Value) -> Result<String, TemplateError> {
    let env = ENV.as_ref().map_err(|e| TemplateError::Load(e.clone()))?;
    let template = env
        .get_template(name)
        .map_err(|_| TemplateError::Unknown(name.to_string()))?;
    Ok(template.render(context)?)
}

/// Every embedded template id.
pub fn names() -> impl Iterator<Item = &'static str> {
    SOURCES.iter().map(|(name, _)| *name)
}
