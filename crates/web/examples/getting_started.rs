use futures::FutureExt;
use http::StatusCode;
use rill_web::date::DateHeader;
use rill_web::middleware::{middleware_fn, Recover};
use rill_web::router::{get, post, Group, Router};
use rill_web::{handler_fn, Request, Response, Server};
use tracing::info;

// curl -v http://127.0.0.1:8080/users/42
async fn user(req: &mut Request) -> String {
    format!("user {}\r\n", req.params().get("id").unwrap_or_default())
}

// curl -v -H "Transfer-Encoding: chunked" -d "name=hello&zip=world" http://127.0.0.1:8080/users
async fn create_user(req: &mut Request) -> Result<(StatusCode, String), StatusCode> {
    let body = req.body_mut().text().await.map_err(|e| e.status().unwrap_or(StatusCode::BAD_REQUEST))?;
    Ok((StatusCode::CREATED, format!("created from {} bytes\r\n", body.len())))
}

// curl -v http://127.0.0.1:8080/search?q=rill
async fn search(req: &mut Request) -> Option<String> {
    req.query().get("q").map(|q| format!("searching for {q}\r\n"))
}

#[tokio::main]
async fn main() {
    let access_log = middleware_fn(|req, next| {
        Box::pin(async move {
            let method = req.method();
            let path = req.path().to_owned();
            let resp = next.call(req).await;
            info!(%method, %path, status = resp.status().as_u16(), "request served");
            resp
        })
    });

    let router = Router::builder()
        .wrap(Recover)
        .wrap(DateHeader::new())
        .route("/search", get(handler_fn(|req| search(req).boxed())))
        .group(
            Group::new("/users")
                .wrap(access_log)
                .route("/", post(handler_fn(|req| create_user(req).boxed())))
                .route("/{id}", get(handler_fn(|req| user(req).boxed()))),
        )
        .error_handler(|req, error| {
            Response::text(format!("{} {}: {error}\r\n", req.method(), req.path())).with_status(error.status())
        })
        .build()
        .unwrap();

    Server::builder().router(router).address("127.0.0.1:8080").build().unwrap().start().await.unwrap();
}
