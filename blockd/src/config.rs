//! Command-line options

/// Name used in messages and log prefixes
pub const PROGRAM: &str = "blockd";

/// Parsed command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    pub device: String,
    pub daemonize: bool,
    pub verbose: bool,
    pub label: Option<String>,
    pub help: bool,
    pub version: bool,
    pub target_dir: Option<String>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            device: String::from("/dev/nbd0"),
            daemonize: false,
            verbose: false,
            label: None,
            help: false,
            version: false,
            target_dir: None,
        }
    }
}

impl Options {
    /// Parse the argument list (without the program name)
    pub fn parse<I: IntoIterator<Item = String>>(args: I) -> Result<Self, String> {
        let mut options = Self::default();
        for arg in args {
            if let Some(value) = arg.strip_prefix("--device=") {
                options.device = value.to_string();
            } else if let Some(value) = arg.strip_prefix("--label=") {
                options.label = Some(value.to_string());
            } else if arg == "--daemonize" {
                options.daemonize = true;
            } else if arg == "--verbose" {
                options.verbose = true;
            } else if arg == "--help" {
                options.help = true;
            } else if arg == "--version" {
                options.version = true;
            } else if arg.starts_with('-') {
                return Err(format!("unknown option '{}'", arg));
            } else if options.target_dir.is_none() {
                options.target_dir = Some(arg);
            } else {
                return Err(String::from("too many arguments"));
            }
        }
        Ok(options)
    }
}

pub fn print_usage() {
    println!(
        "Usage: {program} [options] DIRECTORY\n\
         or: {program} --help\n\
         or: {program} --version\n\
         Options:\n\
         \x20 --daemonize  Fork away from the shell and run as a daemon\n\
         \x20 --device=DEVICE  Open the given network block device\n\
         \x20     instead of the default /dev/nbd0\n\
         \x20 --label=LABEL  Set the volume label (11 characters at most)\n\
         \x20 --verbose  Log every block request\n\
         This program reads a directory (and its subdirectories)\n\
         and presents it as a network block device in FAT32 format.\n\
         The network block device can then be mounted normally.\n\
         The intended use is to export the block device as a raw\n\
         device (for example via the USB mass storage function)\n\
         without interfering with normal use of the directory.\n\
         Limitations:\n\
         \x20 * Currently read-only\n\
         \x20 * Files created while the program runs may not be included\n\
         \x20   in the image",
        program = PROGRAM
    );
}
