use clap::Parser;
use std::path::PathBuf;

/// Command-line arguments. The only knob is the directory the /files routes
/// resolve against; the listen address is fixed.
#[derive(Parser, Debug)]
#[command(name = "http-file-server")]
#[command(about = "A minimal HTTP/1.1 echo and file server", long_about = None)]
pub struct Args {
    /// Root directory for the /files routes
    #[arg(long, default_value = ".")]
    pub directory: PathBuf,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn directory_defaults_to_cwd() {
        let args = Args::parse_from(["http-file-server"]);
        assert_eq!(args.directory, PathBuf::from("."));

        let args = Args::parse_from(["http-file-server", "--directory", "/tmp/files"]);
        assert_eq!(args.directory, PathBuf::from("/tmp/files"));
    }
}
