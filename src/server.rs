//! Serves the current feeds over HTTP, one path per feed.

use actix_web::dev::{Server, ServerHandle};
use actix_web::{App, HttpRequest, HttpResponse, HttpServer, Responder, middleware, web};
use anyhow::{Context, Result, anyhow};
use reqwest::Url;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::feed::IncrementalFeedStore;

const PROTOBUF_CONTENT_TYPE: &str = "application/x-google-protobuf";

/// One feed published at one path.
#[derive(Clone)]
pub struct FeedRoute {
    pub path: String,
    pub store: Arc<IncrementalFeedStore>,
}

/// Registers a GET handler per route. Every request reads the store's current
/// snapshot, so responses always reflect the latest full update.
pub fn feed_routes(routes: Vec<FeedRoute>) -> impl Fn(&mut web::ServiceConfig) + Clone {
    move |cfg: &mut web::ServiceConfig| {
        for route in &routes {
            cfg.service(
                web::resource(route.path.as_str())
                    .app_data(web::Data::from(Arc::clone(&route.store)))
                    .route(web::get().to(serve_feed)),
            );
        }
    }
}

async fn serve_feed(store: web::Data<IncrementalFeedStore>, req: HttpRequest) -> impl Responder {
    let snapshot = store.current_snapshot();
    debug!(
        path = req.path(),
        index = snapshot.incremental_index(),
        "Serving feed"
    );

    if wants_debug(req.query_string()) {
        return HttpResponse::Ok()
            .insert_header(("Content-Type", "text/plain"))
            .body(format!("{:#?}", snapshot.message()));
    }

    HttpResponse::Ok()
        .insert_header(("Content-Type", PROTOBUF_CONTENT_TYPE))
        .body(snapshot.to_bytes())
}

fn wants_debug(query: &str) -> bool {
    query
        .split('&')
        .any(|param| param == "debug" || param.starts_with("debug="))
}

/// Splits a feed URL such as `http://0.0.0.0:8080/trip-updates` into the
/// address to bind and the path to serve.
pub fn bind_target(url: &str) -> Result<(String, String)> {
    let parsed = url
        .parse::<Url>()
        .with_context(|| format!("invalid feed url {url:?}"))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| anyhow!("feed url {url:?} has no host"))?;
    let port = parsed
        .port_or_known_default()
        .ok_or_else(|| anyhow!("feed url {url:?} has no port"))?;
    Ok((format!("{host}:{port}"), parsed.path().to_string()))
}

/// Starts one HTTP server per distinct address. The returned servers must be
/// spawned; their handles stop them.
pub fn start_feed_servers(
    bindings: Vec<(String, Arc<IncrementalFeedStore>)>,
) -> Result<Vec<(Server, ServerHandle)>> {
    let mut by_addr: BTreeMap<String, Vec<FeedRoute>> = BTreeMap::new();
    for (url, store) in bindings {
        let (addr, path) = bind_target(&url)?;
        by_addr.entry(addr).or_default().push(FeedRoute { path, store });
    }

    let mut servers = Vec::with_capacity(by_addr.len());
    for (addr, routes) in by_addr {
        let paths: Vec<String> = routes.iter().map(|r| r.path.clone()).collect();
        let server = HttpServer::new(move || {
            App::new()
                .wrap(middleware::DefaultHeaders::new().add(("Access-Control-Allow-Origin", "*")))
                .configure(feed_routes(routes.clone()))
        })
        .workers(2)
        .disable_signals()
        .bind(&addr)
        .with_context(|| format!("binding feed server to {addr}"))?
        .run();

        info!(addr = %addr, paths = ?paths, "Serving feeds over HTTP");
        let handle = server.handle();
        servers.push((server, handle));
    }
    Ok(servers)
}
