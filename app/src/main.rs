mod cli;

use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use cli::Cli;
use streamtrack::{
    load, EngineConfig, Fetch, HttpClient, Language, LoadRequest, ManifestKind, ManifestSource,
    Track, TrackSet,
};
use url::Url;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "streamtrack=debug,app=debug".to_string()
        } else {
            "streamtrack=info,app=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    let config = match &cli.config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => EngineConfig::default(),
    };

    let language: Language = cli
        .lang
        .parse()
        .with_context(|| format!("Invalid --lang {:?}", cli.lang))?;

    let fetcher = HttpClient::new(&config.http).context("Failed to create HTTP client")?;
    let (source, kind) = resolve_source(&cli, &fetcher)?;
    tracing::info!("Loading {} manifest from {}", kind, cli.source);

    let request = LoadRequest {
        source,
        kind,
        language,
        trim: cli.trim,
    };
    let tracks = load(&request, &fetcher, &config)
        .with_context(|| format!("Failed to load tracks from {}", cli.source))?;

    if cli.json {
        let json_str = serde_json::to_string_pretty(&tracks)?;
        println!("{}", json_str);
    } else {
        print_tracks(&tracks);
    }

    Ok(())
}

/// Without --kind a URL is fetched once here to sniff its format; files are
/// always read here and passed on as text.
fn resolve_source(cli: &Cli, fetcher: &HttpClient) -> Result<(ManifestSource, ManifestKind)> {
    let explicit_kind = cli
        .kind
        .as_deref()
        .map(str::parse::<ManifestKind>)
        .transpose()?;

    if let Ok(url) = Url::parse(&cli.source) {
        if matches!(url.scheme(), "http" | "https") {
            let kind = match explicit_kind {
                Some(kind) => kind,
                None => {
                    let body = fetcher.fetch_text(&url)?;
                    let kind = ManifestKind::detect(&body)
                        .context("Cannot tell whether the manifest is DASH or HLS; pass --kind")?;
                    return Ok((
                        ManifestSource::Text {
                            body,
                            url: Some(url),
                        },
                        kind,
                    ));
                }
            };
            return Ok((ManifestSource::Url(url), kind));
        }
    }

    let path = Path::new(&cli.source);
    if !path.exists() {
        anyhow::bail!("Manifest file does not exist: {:?}", path);
    }
    let body = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let kind = match explicit_kind {
        Some(kind) => kind,
        None => ManifestKind::detect(&body)
            .context("Cannot tell whether the manifest is DASH or HLS; pass --kind")?,
    };
    let url = cli
        .base_url
        .as_deref()
        .map(Url::parse)
        .transpose()
        .context("Invalid --base-url")?;

    Ok((ManifestSource::Text { body, url }, kind))
}

fn print_tracks(tracks: &TrackSet) {
    println!("Video Tracks: {}", tracks.videos().count());
    for video in tracks.sort_videos_by_quality() {
        print!("  {} {}", video.codec, video.range);
        if let (Some(width), Some(height)) = (video.width, video.height) {
            print!(" {}x{}", width, height);
        }
        if let Some(fps) = video.frame_rate {
            print!(" @ {:.3} fps", fps);
        }
        if let Some(bitrate) = video.bitrate {
            print!(", {} kb/s", bitrate / 1000);
        }
        if let Some(audio) = video.embedded_audio {
            print!(", embedded {} audio", audio);
        }
        println!(" [{}]", video.language);
    }

    println!("\nAudio Tracks: {}", tracks.audios().count());
    for audio in tracks.audios() {
        print!("  {}", audio.codec);
        if let Some(ref channels) = audio.channels {
            print!(" {}", channels);
        }
        if let Some(bitrate) = audio.bitrate {
            print!(", {} kb/s", bitrate / 1000);
        }
        if audio.is_descriptive {
            print!(" (descriptive)");
        }
        println!(" [{}]", audio.language);
    }

    println!("\nSubtitle Tracks: {}", tracks.subtitles().count());
    for subtitle in tracks.subtitles() {
        print!("  {}", subtitle.codec);
        if subtitle.is_forced {
            print!(" (forced)");
        }
        if subtitle.is_sdh {
            print!(" (SDH)");
        }
        println!(" [{}]", subtitle.language);
    }

    let mut licenses: Vec<String> = tracks
        .iter()
        .filter(|track| matches!(track, Track::Video(_)))
        .flat_map(|track| track.license_targets())
        .map(|(system, url)| format!("{}: {}", system, url))
        .collect();
    licenses.sort();
    licenses.dedup();
    if !licenses.is_empty() {
        println!("\nLicense servers:");
        for license in licenses {
            println!("  {}", license);
        }
    }
}
