use super::types::RouteDescriptor;
use anyhow::Context;
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

#[derive(Deserialize)]
#[serde(untagged)]
enum RouteTableFile {
    Bare(Vec<RouteDescriptor>),
    Wrapped { routes: Vec<RouteDescriptor> },
}

/// Parse a route table from YAML or JSON text.
///
/// Accepts either a top-level sequence of routes or a mapping with a
/// `routes` key.
pub fn parse_routes(content: &str, yaml: bool) -> anyhow::Result<Vec<RouteDescriptor>> {
    let table: RouteTableFile = if yaml {
        serde_yaml::from_str(content).context("failed to parse route table as YAML")?
    } else {
        serde_json::from_str(content).context("failed to parse route table as JSON")?
    };
    Ok(match table {
        RouteTableFile::Bare(routes) => routes,
        RouteTableFile::Wrapped { routes } => routes,
    })
}

/// Load a route table from disk. The format follows the file extension
/// (`.yaml`/`.yml` for YAML, anything else is read as JSON).
pub fn load_routes(file_path: impl AsRef<Path>) -> anyhow::Result<Vec<RouteDescriptor>> {
    let file_path = file_path.as_ref();
    let content = std::fs::read_to_string(file_path)
        .with_context(|| format!("failed to read route table {}", file_path.display()))?;
    let yaml = matches!(
        file_path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    );
    let routes = parse_routes(&content, yaml)
        .with_context(|| format!("invalid route table {}", file_path.display()))?;
    debug!(
        file = %file_path.display(),
        routes = routes.len(),
        "Loaded route table"
    );
    Ok(routes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;

    #[test]
    fn test_parse_bare_yaml_sequence() {
        let yaml = r#"
- method: get
  path: /pets/{id}
  settings:
    plugins:
      ratify:
        path:
          type: object
          properties:
            id: { type: integer }
"#;
        let routes = parse_routes(yaml, true).unwrap();
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].method, Method::GET);
        assert!(routes[0]
            .validation_options("ratify")
            .unwrap()
            .unwrap()
            .path
            .is_some());
    }

    #[test]
    fn test_parse_wrapped_json() {
        let json = r#"{ "routes": [ { "method": "DELETE", "path": "/pets/{id}" } ] }"#;
        let routes = parse_routes(json, false).unwrap();
        assert_eq!(routes[0].method, Method::DELETE);
        assert!(routes[0].settings.plugins.is_empty());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_routes("{ not json", false).is_err());
        assert!(parse_routes("- method: [1, 2]\n  path: /x\n", true).is_err());
    }
}
