//! Version command implementation.

const VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn run() {
    println!("shapewise {VERSION}");
    println!();
    println!("Cluster-wide query settings that cannot lose updates.");
    println!();
    println!("Build info:");
    println!("  Target:       {}", std::env::consts::ARCH);
    println!("  OS:           {}", std::env::consts::OS);
    println!("  Fail point:   {}", shapewise::PAUSE_AFTER_READ);
}
