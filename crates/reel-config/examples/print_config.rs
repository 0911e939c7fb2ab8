/// Example program to print the loaded configuration
///
/// Run with: cargo run -p reel-config --example print_config

fn main() {
    let config = reel_config::ReelConfig::load();

    println!("=== Reel Configuration ===\n");

    println!("Engine Settings:");
    println!("  Library Path: {:?}", config.engine.library_path);
    println!("  Hwdec: {}", config.engine.hwdec);
    println!("  Log Level: {}", config.engine.log_level);
    println!("  Cache Seconds: {:?}", config.engine.cache_secs);
    println!("  Autoplay: {}", config.engine.autoplay);
    for (key, value) in &config.engine.options {
        println!("  Option {} = {}", key, value);
    }
    println!();

    println!("Render Settings:");
    let api = if config.render.gles { " ES" } else { "" };
    println!("  GL Version: {}.{}{}", config.render.gl_major, config.render.gl_minor, api);
    println!("  Frame Deadline: {}ms", config.render.frame_deadline_ms);
    println!("  Opaque: {}", config.render.opaque);
    println!();

    println!("Lookup Settings:");
    println!("  Enabled: {}", config.lookup.enabled);
    println!("  Endpoint: {}", config.lookup.endpoint);
    println!();

    match toml::to_string_pretty(&config) {
        Ok(toml_str) => {
            println!("=== Serialized Configuration ===");
            println!("{}", toml_str);
        }
        Err(e) => {
            eprintln!("Failed to serialize config: {}", e);
        }
    }
}
