//! Command-line argument definitions for the `segfetch` binary.
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

/// A concurrent, resumable, segmented downloader.
///
/// Files are split into byte ranges and playlists into their segments; the
/// pieces are fetched in parallel and merged in order. Interrupted downloads
/// resume from the fragments already on disk.
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Download a single file in byte-range fragments
    File {
        /// The URL of the file to download.
        #[arg(short, long)]
        url: String,

        /// The name of the output file. Derived from the URL when omitted.
        #[arg(short, long)]
        output: Option<String>,

        /// Fragment size in bytes (default 4 MiB).
        #[arg(long)]
        fragment_size: Option<u64>,

        #[command(flatten)]
        common: CommonArgs,
    },
    /// Download every segment of an M3U8 media playlist into one file
    Playlist {
        /// The URL of the playlist.
        #[arg(short, long)]
        url: String,

        /// The name of the output file.
        #[arg(short, long)]
        output: String,

        #[command(flatten)]
        common: CommonArgs,
    },
}

#[derive(ClapArgs, Debug)]
pub struct CommonArgs {
    /// The number of concurrent workers to use.
    #[arg(short = 't', long)]
    pub threads: Option<usize>,

    /// The directory to save the file in. Defaults to the current directory.
    #[arg(short = 'd', long)]
    pub dir: Option<String>,

    /// Where fragment scratch files are kept between runs.
    #[arg(long)]
    pub scratch_dir: Option<PathBuf>,
}
