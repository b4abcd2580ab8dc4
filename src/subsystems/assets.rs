//! Static asset hosting.
//!
//! Every file under the asset root becomes its own route, so the set of
//! public paths is known before authentication is registered. `index.html`
//! is served at its directory; `*.gz` files are served under the name without
//! the suffix with `Content-Encoding: gzip`.

use std::path::{Path, PathBuf};

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
};

use crate::http::RouteKind;
use crate::lifecycle::startup::{Registrar, StartupError};

const OWNER: &str = "static_assets";

/// A file and the web path it is served at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    pub file: PathBuf,
    pub web_path: String,
    pub content_type: &'static str,
    pub gzip: bool,
}

pub fn register(r: &mut Registrar) -> Result<(), StartupError> {
    let root = r.config().assets.root.clone();
    let assets = match scan(&root) {
        Ok(assets) => assets,
        Err(e) => {
            tracing::warn!(root = %root.display(), error = %e, "Static asset directory unreadable");
            return Ok(());
        }
    };

    for asset in assets {
        if !routable(&asset.web_path) {
            tracing::warn!(file = %asset.file.display(), "Skipping asset with unroutable name");
            continue;
        }
        if r.app().has_route(&asset.web_path) {
            tracing::warn!(
                file = %asset.file.display(),
                path = %asset.web_path,
                "Skipping asset shadowed by another file"
            );
            continue;
        }
        let path = asset.web_path.clone();
        r.route(OWNER, &path, RouteKind::Static, get(move || serve(asset.clone())))?;
    }
    Ok(())
}

/// Whether `web_path` can be registered as a literal route. Captures and
/// wildcards are written `{..}`, and segments starting with `:` or `*` are
/// rejected by the router outright.
fn routable(web_path: &str) -> bool {
    !web_path.contains(&['{', '}'][..])
        && !web_path
            .split('/')
            .any(|segment| segment.starts_with(':') || segment.starts_with('*'))
}

/// Walk `root` and compute the route of every file, sorted by web path.
///
/// When `name` and `name.gz` both exist, the compressed file comes first and
/// wins the route.
pub fn scan(root: &Path) -> std::io::Result<Vec<Asset>> {
    let mut assets = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let file_type = entry.file_type()?;
            if file_type.is_dir() {
                pending.push(entry.path());
            } else if file_type.is_file() {
                if let Some(asset) = asset_for(root, entry.path()) {
                    assets.push(asset);
                }
            }
        }
    }

    assets.sort_by(|a, b| a.web_path.cmp(&b.web_path).then(b.gzip.cmp(&a.gzip)));
    Ok(assets)
}

fn asset_for(root: &Path, file: PathBuf) -> Option<Asset> {
    let relative = file.strip_prefix(root).ok()?;
    let mut segments: Vec<String> = relative
        .iter()
        .map(|s| s.to_string_lossy().into_owned())
        .collect();

    let last = segments.pop()?;
    let (name, gzip) = match last.strip_suffix(".gz") {
        Some(stripped) => (stripped.to_string(), true),
        None => (last, false),
    };
    let content_type = content_type(&name);

    let mut web_path = String::from("/");
    for segment in &segments {
        web_path.push_str(segment);
        web_path.push('/');
    }
    if name != "index.html" {
        web_path.push_str(&name);
    }

    Some(Asset {
        file,
        web_path,
        content_type,
        gzip,
    })
}

fn content_type(name: &str) -> &'static str {
    let ext = name.rsplit_once('.').map(|(_, e)| e).unwrap_or("");
    match ext {
        "html" => "text/html;charset=UTF-8",
        "css" => "text/css;charset=UTF-8",
        "js" => "application/javascript;charset=UTF-8",
        "json" | "map" => "application/json",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "ico" => "image/vnd.microsoft.icon",
        "woff" => "application/x-font-woff",
        "woff2" => "font/woff2",
        "txt" => "text/plain",
        _ => "application/octet-stream",
    }
}

async fn serve(asset: Asset) -> Response {
    match tokio::fs::read(&asset.file).await {
        Ok(bytes) => {
            let mut response = ([(header::CONTENT_TYPE, asset.content_type)], bytes).into_response();
            if asset.gzip {
                response.headers_mut().insert(
                    header::CONTENT_ENCODING,
                    header::HeaderValue::from_static("gzip"),
                );
            }
            response
        }
        Err(e) => {
            tracing::warn!(file = %asset.file.display(), error = %e, "Static asset vanished");
            StatusCode::NOT_FOUND.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::bus::LocalBus;
    use crate::config::DaemonConfig;
    use crate::lifecycle::context::RuntimeContext;
    use crate::net::ListenTarget;

    #[test]
    fn maps_files_to_routes() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<html/>").unwrap();
        std::fs::create_dir_all(dir.path().join("js")).unwrap();
        std::fs::write(dir.path().join("js/app.js.gz"), [0x1f, 0x8b]).unwrap();
        std::fs::create_dir_all(dir.path().join("docs")).unwrap();
        std::fs::write(dir.path().join("docs/index.html"), "").unwrap();

        let assets = scan(dir.path()).unwrap();
        let paths: Vec<_> = assets.iter().map(|a| a.web_path.as_str()).collect();
        assert_eq!(paths, vec!["/", "/docs/", "/js/app.js"]);

        let js = &assets[2];
        assert!(js.gzip);
        assert_eq!(js.content_type, "application/javascript;charset=UTF-8");
        assert_eq!(assets[0].content_type, "text/html;charset=UTF-8");
    }

    #[test]
    fn compressed_twin_sorts_first() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("app.js"), "plain").unwrap();
        std::fs::write(dir.path().join("app.js.gz"), [0x1f, 0x8b]).unwrap();

        let assets = scan(dir.path()).unwrap();
        assert_eq!(assets.len(), 2);
        assert!(assets.iter().all(|a| a.web_path == "/app.js"));
        assert!(assets[0].gzip);
    }

    #[test]
    fn router_syntax_is_unroutable() {
        assert!(routable("/js/app.js"));
        assert!(routable("/docs/"));
        assert!(routable("/a:b.txt"));
        assert!(!routable("/:weird.txt"));
        assert!(!routable("/*.txt"));
        assert!(!routable("/img/*star.png"));
        assert!(!routable("/{id}.json"));
    }

    #[tokio::test]
    async fn odd_file_names_do_not_abort_registration() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<html/>").unwrap();
        std::fs::write(dir.path().join(":weird.txt"), "").unwrap();
        std::fs::write(dir.path().join("*.txt"), "").unwrap();
        std::fs::create_dir_all(dir.path().join("js")).unwrap();
        std::fs::write(dir.path().join("js/app.js"), "plain").unwrap();
        std::fs::write(dir.path().join("js/app.js.gz"), [0x1f, 0x8b]).unwrap();

        let mut config = DaemonConfig::default();
        config.assets.root = dir.path().to_path_buf();
        let context = Arc::new(RuntimeContext::new(
            tokio::runtime::Handle::current(),
            Box::new(LocalBus::default()),
        ));
        let mut r = Registrar::new(context, Arc::new(config), ListenTarget::Port(1));

        register(&mut r).unwrap();
        let paths: Vec<_> = r.app().routes().iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["/", "/js/app.js"]);
    }

    #[test]
    fn missing_root_is_an_error() {
        assert!(scan(Path::new("/nonexistent/www")).is_err());
    }

    #[test]
    fn unknown_extensions_are_binary() {
        assert_eq!(content_type("blob.bin"), "application/octet-stream");
        assert_eq!(content_type("README"), "application/octet-stream");
    }
}
