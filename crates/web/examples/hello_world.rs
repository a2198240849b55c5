use futures::FutureExt;
use rill_web::date::DateHeader;
use rill_web::router::{get, Router};
use rill_web::{handler_fn, Server};

#[tokio::main]
async fn main() {
    let router = Router::builder()
        .route("/", get(handler_fn(|_req| async { "hello world" }.boxed())))
        .wrap(DateHeader::new())
        .build()
        .unwrap();

    Server::builder().router(router).address("127.0.0.1:3000").build().unwrap().start().await.unwrap();
}
