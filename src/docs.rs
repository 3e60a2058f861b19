//! Markdown documentation of the variables a struct binds.

use crate::tag::FieldParams;
use std::{fs, path::Path};

/// Render a summary table of every keyed field
pub fn render_markdown(params: &[FieldParams]) -> String {
    let mut md = String::new();

    md.push_str("## Environment Variables Summary\n\n");
    md.push_str("| Variable | Required | Default | Options |\n");
    md.push_str("|----------|----------|---------|---------|\n");
    for field in params.iter().filter(|p| !p.ignored) {
        let required_str = if field.required { "Yes" } else { "No" };
        let default_display = match field.default_value.as_deref() {
            Some("") => "`\"\"`".to_string(),
            Some(value) => format!("`{}`", value.replace('|', "\\|")),
            None => "-".to_string(),
        };
        let options = field
            .options()
            .into_iter()
            .filter(|option| *option != "required")
            .collect::<Vec<_>>();
        let options_display = if options.is_empty() {
            "-".to_string()
        } else {
            options.join(", ")
        };
        md.push_str(&format!(
            "| `{}` | {} | {} | {} |\n",
            field.key, required_str, default_display, options_display
        ));
    }

    md
}

/// Write [`render_markdown`] output to `path`
///
/// # Example
/// ```no_run
/// use envbind::{docs, Env, Load};
///
/// #[derive(Default, Env)]
/// struct Server {
///     #[env(key = "PORT", default = 8080)]
///     port: u16,
/// }
///
/// let params = Server::field_params().unwrap();
/// docs::write_docs(&params, "CONFIG.md").unwrap();
/// ```
pub fn write_docs(params: &[FieldParams], path: impl AsRef<Path>) -> std::io::Result<()> {
    fs::write(path, render_markdown(params))
}
