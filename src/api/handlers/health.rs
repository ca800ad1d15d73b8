/// Liveness probe. Does not touch any provider.
pub async fn health() -> &'static str {
    "OK"
}
