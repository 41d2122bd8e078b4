use clap::Parser;
use cpu_time::ProcessTime;
use env_logger::Builder;
use flate2::read::GzDecoder;
use log::LevelFilter;

use std::{
    fs,
    io::{self, Write},
    path::PathBuf,
    time::{SystemTime, UNIX_EPOCH},
};

use gzip_chunk::{GzipChunk, GzipChunkConfig};

const DEFAULT_PAYLOAD: &str = "++?????++ Out of Cheese Error. Redo From Start.<br/>\n";

#[derive(Parser)]
#[command(name = "gzipchunk_util")]
#[command(about = "Builds a gzip stream with a precompressed block spliced in several times", long_about = None)]
struct Cli {
    /// File to write the gzip stream to. Writes to stdout if not given.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Text that is repeated to build the precompressed block
    #[arg(long, default_value = DEFAULT_PAYLOAD)]
    payload: String,

    /// Number of times the payload is repeated inside the precompressed block
    #[arg(long, default_value = "100000")]
    bomb_reps: u64,

    /// Number of times the precompressed block is embedded into the output
    #[arg(long, default_value = "2")]
    embed_count: u32,

    /// Compression level (0-9) to use for the DEFLATE data
    #[arg(short = 'c', long, default_value = "6")]
    level: u32,

    /// level of logging to use
    #[arg(long, default_value = "Error")]
    loglevel: LevelFilter,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    Builder::new().filter_level(cli.loglevel).init();

    let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();

    let config = GzipChunkConfig {
        compression_level: cli.level,
        timestamp: now as u32,
    };

    eprintln!("Creating bomb...");
    let start = ProcessTime::now();

    let mut bomb = GzipChunk::with_config(config)?;
    bomb.add(cli.payload.as_str(), cli.bomb_reps)?;
    let bomb_stream = bomb.finalize()?;

    eprintln!(
        "Bomb compressed length is {}, created in {:?}",
        bomb_stream.len(),
        start.elapsed()
    );
    eprintln!("Bomb uncompressed length is {}", bomb.uncompressed_len());

    let bomb = bomb.seal()?;

    let start = ProcessTime::now();

    let mut page = GzipChunk::with_config(config)?;
    page.add(format!("generated at {}\n", now).as_str(), 1)?;

    for i in 0..cli.embed_count {
        page.add(&bomb, 1)?;
        if i + 1 < cli.embed_count {
            page.add("That was the time", 1)?;
        } else {
            page.add("That was the time that was", 1)?;
        }
    }

    let output = page.finalize()?;

    eprintln!("Chunks: {}", page.fragment_count());
    eprintln!("Output length: {}, built in {:?}", output.len(), start.elapsed());

    let decompressed_len = io::copy(&mut GzDecoder::new(&output[..]), &mut io::sink())?;
    eprintln!("Decompressed length: {}", decompressed_len);

    if decompressed_len != page.uncompressed_len() {
        anyhow::bail!(
            "decompressed length {} does not match expected {}",
            decompressed_len,
            page.uncompressed_len()
        );
    }

    match cli.output {
        Some(path) => fs::write(path, &output)?,
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(&output)?;
            stdout.flush()?;
        }
    }

    Ok(())
}
