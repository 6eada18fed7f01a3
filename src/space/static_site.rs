//! Built-in loader serving a mirror directory as a static site.

use axum::Router;
use tower_http::services::ServeDir;
use tracing::debug;

use super::SpaceError;
use super::loader::{LoadContext, RouterApp, SpaceApp, SpaceLoader};

/// Loader for `static` entries.
#[derive(Debug, Default, Clone, Copy)]
pub struct StaticSiteLoader;

impl SpaceLoader for StaticSiteLoader {
    fn load(&self, ctx: LoadContext) -> Result<Box<dyn SpaceApp>, SpaceError> {
        if !ctx.mirror_dir.is_dir() {
            return Err(SpaceError::NotInstalled(ctx.mirror_dir));
        }

        debug!(
            "[SPACE] Static site {} from {} ({})",
            ctx.space_name,
            ctx.mirror_dir.display(),
            ctx.module_id
        );

        let router = Router::new().fallback_service(ServeDir::new(&ctx.mirror_dir));
        Ok(Box::new(RouterApp::new(&ctx.space_name, router)))
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::{Read, Write};
    use std::net::{SocketAddr, TcpStream};
    use tempfile::TempDir;

    #[test]
    fn test_missing_mirror_is_not_installed() {
        let dir = TempDir::new().expect("temp dir");
        let ctx = LoadContext::new("Docs", dir.path().to_path_buf(), dir.path().join("absent"));
        assert!(matches!(
            StaticSiteLoader.load(ctx),
            Err(SpaceError::NotInstalled(_))
        ));
    }

    #[test]
    fn test_serves_index() {
        let dir = TempDir::new().expect("temp dir");
        let mirror = dir.path().join("mirror");
        fs::create_dir_all(&mirror).expect("mkdir");
        fs::write(mirror.join("index.html"), "<h1>docs</h1>").expect("write");

        let ctx = LoadContext::new("Docs", dir.path().to_path_buf(), mirror);
        let mut app = StaticSiteLoader.load(ctx).expect("load");

        let addr: SocketAddr = "127.0.0.1:0".parse().expect("addr");
        let info = app.launch("127.0.0.1", addr).expect("launch");

        let mut stream = TcpStream::connect(info.addr).expect("connect");
        stream
            .write_all(b"GET / HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .expect("write");
        let mut response = String::new();
        stream.read_to_string(&mut response).expect("read");
        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(response.contains("<h1>docs</h1>"));

        app.close();
    }
}
