pub mod algebra_2d;
pub mod drawer;
pub mod environment;
pub mod pursuit;
pub mod track;
pub mod vehicle;

#[cfg(test)]
#[ctor::ctor]
fn init() {
    let _ = env_logger::builder()
        .format_timestamp_secs()
        .filter_level(log::LevelFilter::Debug)
        .parse_default_env()
        .is_test(true)
        .try_init();
}
