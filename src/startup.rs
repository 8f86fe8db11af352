// Startup module - displays banner and module loading status
//
// This module provides a professional startup experience showing:
// - Version info and branding
// - Configuration loaded from file
// - Module loading status with checkmarks

use crate::config::{Config, VERSION};

/// ANSI color codes for terminal output
mod colors {
    pub const RESET: &str = "\x1b[0m";
    pub const BOLD: &str = "\x1b[1m";
    pub const DIM: &str = "\x1b[2m";
    pub const CYAN: &str = "\x1b[36m";
    pub const GREEN: &str = "\x1b[32m";
    pub const YELLOW: &str = "\x1b[33m";
    pub const MAGENTA: &str = "\x1b[35m";
}

/// Module loading result for display
pub struct ModuleStatus {
    pub name: &'static str,
    pub enabled: bool,
    pub description: &'static str,
}

/// Print the startup banner and module loading status
pub fn print_startup(config: &Config) {
    use colors::*;

    // Banner
    println!();
    println!("  {BOLD}{CYAN}memgate{RESET} {DIM}v{VERSION}{RESET}");
    println!("  {DIM}Memory-enabled gateway for LLM completions{RESET}");
    println!();

    // Config file status
    if let Some(path) = Config::config_path() {
        if path.exists() {
            println!("  {DIM}Config:{RESET} {GREEN}✓{RESET} {}", path.display());
        } else {
            println!("  {DIM}Config:{RESET} {DIM}(using defaults){RESET}");
        }
    }
    println!();

    // Module loading
    println!("  {DIM}Loading modules...{RESET}");

    let modules = get_module_status(config);
    for module in &modules {
        print_module_status(module);
    }

    println!();

    // Gateway info
    println!(
        "  {MAGENTA}▸{RESET} Gateway listening on {BOLD}{}{RESET}",
        config.bind_addr
    );
    if config.backend.embedded {
        println!(
            "  {MAGENTA}▸{RESET} Backend on {BOLD}{}{RESET}",
            config.backend.authority()
        );
    } else if let Some(url) = &config.upstream.base_url {
        println!("  {YELLOW}▸{RESET} External upstream: {BOLD}{url}{RESET}");
    }
    println!();
}

/// Get status of all modules based on config
fn get_module_status(config: &Config) -> Vec<ModuleStatus> {
    vec![
        ModuleStatus {
            name: "gateway",
            enabled: true, // Core, always on
            description: "HTTP server + relay",
        },
        ModuleStatus {
            name: "completions",
            enabled: true, // Core, always on
            description: "Buffered + SSE dispatch",
        },
        ModuleStatus {
            name: "backend",
            enabled: config.backend.embedded,
            description: "Embedded model router",
        },
        ModuleStatus {
            name: "memory",
            enabled: config.memory.enabled,
            description: "Persistent context",
        },
        ModuleStatus {
            name: "file-log",
            enabled: config.logging.file_enabled,
            description: "JSON log files",
        },
    ]
}

/// Print a single module's status
fn print_module_status(module: &ModuleStatus) {
    use colors::*;

    let (icon, style) = if module.enabled {
        (format!("{GREEN}✓{RESET}"), "")
    } else {
        (format!("{DIM}○{RESET}"), DIM)
    };

    println!(
        "    {icon} {style}{:<12}{RESET} {DIM}{}{RESET}",
        module.name, module.description
    );
}

/// Log the boot sequence through tracing (useful with file logging)
pub fn log_startup(config: &Config) {
    tracing::info!("memgate v{} starting", VERSION);

    let modules = get_module_status(config);
    for module in &modules {
        let icon = if module.enabled { "✓" } else { "○" };
        tracing::info!("  {} {} - {}", icon, module.name, module.description);
    }

    tracing::info!("▸ Listening on {}", config.bind_addr);
}
