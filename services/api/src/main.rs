use form_intake_api::run;

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("form-intake: {err}");
        std::process::exit(1);
    }
}
