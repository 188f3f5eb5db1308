// vmate Infrastructure - System Adapters
// Implements: ProcessLauncher (openvpn subprocesses), LocationResolver (ipinfo)

pub mod ipinfo_resolver;
pub mod process_tree;
pub mod subprocess_launcher;

pub use ipinfo_resolver::IpInfoResolver;
pub use subprocess_launcher::SubprocessLauncher;
