use dlt_example_user::{config::SessionConfig, driver::Driver, logging};

#[tokio::main]
async fn main() {
    logging::init_logging();

    let driver = Driver::system(SessionConfig::from_env());
    let mut out = std::io::stdout();
    let mut err = std::io::stderr();
    let code = driver.run(std::env::args_os(), &mut out, &mut err).await;

    std::process::exit(code);
}
