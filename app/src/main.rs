use vireo_app::{App, AppArgs, DemoScene};

fn main() {
    let args = AppArgs::parse();
    match App::run(DemoScene::new(), args) {
        Ok(summary) => {
            if summary.renderer_dropped_frames + summary.headset_dropped_frames > 0 {
                log::warn!(
                    "{} renderer and {} headset frames were dropped",
                    summary.renderer_dropped_frames,
                    summary.headset_dropped_frames
                );
            }
        }
        Err(e) => {
            log::error!("{}", e);
            eprintln!("vireo: {}", e);
            std::process::exit(e.exit_code());
        }
    }
}
