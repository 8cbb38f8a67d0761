mod common;

use common::{config, en, url, MemoryFetch};
use streamtrack::tracks::audio::AudioCodec;
use streamtrack::tracks::segment::Addressing;
use streamtrack::tracks::subtitle::SubtitleCodec;
use streamtrack::tracks::video::{DynamicRange, VideoCodec};
use streamtrack::{
    load, EngineConfig, Error, KeySystem, Language, LoadRequest, ManifestKind, ManifestSource,
};

const BASE: &str = "https://cdn.example.com/hls/";

const MASTER: &str = r#"#EXTM3U
#EXT-X-VERSION:6
#EXT-X-INDEPENDENT-SEGMENTS
#EXT-X-SESSION-KEY:METHOD=SAMPLE-AES,URI="skd://fairplay-key",KEYFORMAT="com.apple.streamingkeydelivery",KEYFORMATVERSIONS="1"
#EXT-X-SESSION-KEY:METHOD=SAMPLE-AES,URI="data:text/plain;base64,AAAAW3Bzc2gAAAAA7e+LqXnWSs6jyCfc1R0h7Q==",KEYFORMAT="urn:uuid:edef8ba9-79d6-4ace-a3c8-27dcd51d21ed",KEYFORMATVERSIONS="1"
#EXT-X-MEDIA:TYPE=AUDIO,GROUP-ID="aac",LANGUAGE="en",NAME="English",DEFAULT=YES,AUTOSELECT=YES,CHANNELS="2",URI="audio/en.m3u8"
#EXT-X-MEDIA:TYPE=AUDIO,GROUP-ID="aac",LANGUAGE="en",NAME="English (Described)",AUTOSELECT=YES,CHANNELS="2",CHARACTERISTICS="public.accessibility.describes-video",URI="audio/en_ad.m3u8"
#EXT-X-MEDIA:TYPE=SUBTITLES,GROUP-ID="subs",LANGUAGE="fr",NAME="French (forced)",AUTOSELECT=YES,FORCED=YES,URI="subs/fr_forced.m3u8"
#EXT-X-STREAM-INF:BANDWIDTH=6000000,RESOLUTION=1920x1080,FRAME-RATE=23.976,CODECS="hvc1.2.4.L150.90,mp4a.40.2",VIDEO-RANGE=PQ,AUDIO="aac",SUBTITLES="subs"
video/1080.m3u8
#EXT-X-I-FRAME-STREAM-INF:BANDWIDTH=300000,RESOLUTION=1920x1080,CODECS="hvc1.2.4.L150.90",URI="video/1080_iframes.m3u8"
"#;

const VIDEO: &str = r#"#EXTM3U
#EXT-X-VERSION:6
#EXT-X-TARGETDURATION:6
#EXT-X-PLAYLIST-TYPE:VOD
#EXT-X-MAP:URI="init.mp4"
#EXT-X-KEY:METHOD=SAMPLE-AES,URI="skd://fairplay-key",KEYFORMAT="com.apple.streamingkeydelivery",KEYFORMATVERSIONS="1"
#EXT-X-KEY:METHOD=SAMPLE-AES,URI="https://license.example.com/widevine",KEYFORMAT="urn:uuid:edef8ba9-79d6-4ace-a3c8-27dcd51d21ed",KEYFORMATVERSIONS="1"
#EXTINF:6.0,
seg1.m4s
#EXTINF:6.0,
seg2.m4s
#EXTINF:4.0,
seg3.m4s
#EXT-X-ENDLIST
"#;

const AUDIO: &str = r#"#EXTM3U
#EXT-X-VERSION:6
#EXT-X-TARGETDURATION:6
#EXT-X-PLAYLIST-TYPE:VOD
#EXTINF:6.0,
a1.m4s
#EXTINF:6.0,
a2.m4s

#PLUTO-DRM:ID="fairplay",KEYFORMAT="com.apple.streamingkeydelivery"
#EXTINF:4.0,
a3.m4s
#EXT-X-ENDLIST
"#;

const SUBTITLES: &str = r#"#EXTM3U
#EXT-X-TARGETDURATION:6
#EXT-X-PLAYLIST-TYPE:VOD
#EXTINF:6.0,
fr_1.vtt
#EXT-X-ENDLIST
"#;

fn presentation() -> MemoryFetch {
    MemoryFetch::new()
        .with(&format!("{BASE}master.m3u8"), MASTER)
        .with(&format!("{BASE}video/1080.m3u8"), VIDEO)
        .with(&format!("{BASE}audio/en.m3u8"), AUDIO)
        .with(&format!("{BASE}audio/en_ad.m3u8"), AUDIO)
        .with(&format!("{BASE}subs/fr_forced.m3u8"), SUBTITLES)
}

fn url_request(path: &str, language: Language) -> LoadRequest {
    LoadRequest {
        source: ManifestSource::Url(url(&format!("{BASE}{path}"))),
        kind: ManifestKind::Hls,
        language,
        trim: false,
    }
}

fn text_request(body: &str, base: Option<&str>) -> LoadRequest {
    LoadRequest {
        source: ManifestSource::Text {
            body: body.to_string(),
            url: base.map(url),
        },
        kind: ManifestKind::Hls,
        language: en(),
        trim: false,
    }
}

#[test]
fn test_master_playlist_tracks() {
    let fetcher = presentation();
    let german: Language = "de".parse().unwrap();
    let tracks = load(&url_request("master.m3u8", german), &fetcher, &config()).unwrap();

    assert_eq!(tracks.videos().count(), 1);
    assert_eq!(tracks.audios().count(), 2);
    assert_eq!(tracks.subtitles().count(), 1);

    let video = tracks.videos().next().unwrap();
    assert_eq!(video.codec, VideoCodec::Hevc);
    assert_eq!(video.range, DynamicRange::Hdr10);
    assert_eq!((video.width, video.height), (Some(1920), Some(1080)));
    assert_eq!(video.bitrate, Some(6_000_000));
    // Variants carry no language of their own.
    assert_eq!(video.language.as_str(), "de");
    // Audio is served by the group's renditions, not muxed in.
    assert_eq!(video.embedded_audio, None);

    let segments = &video.source.segments;
    assert_eq!(
        segments.addressing,
        Addressing::Playlist {
            url: format!("{BASE}video/1080.m3u8")
        }
    );
    assert_eq!(segments.segments.len(), 3);
    assert_eq!(segments.segments[0].url, format!("{BASE}video/seg1.m4s"));
    assert_eq!(
        segments.init.as_ref().map(|init| init.url.clone()),
        Some(format!("{BASE}video/init.mp4"))
    );
    assert_eq!(segments.duration(), Some(16.0));

    let (main, described): (Vec<_>, Vec<_>) =
        tracks.audios().partition(|audio| !audio.is_descriptive);
    assert_eq!(main.len(), 1);
    assert_eq!(described.len(), 1);
    assert_eq!(main[0].codec, AudioCodec::Aac);
    assert_eq!(main[0].channels.as_deref(), Some("2.0"));
    assert_eq!(main[0].language.as_str(), "en");

    let subtitle = tracks.subtitles().next().unwrap();
    assert_eq!(subtitle.codec, SubtitleCodec::WebVtt);
    assert_eq!(subtitle.language.as_str(), "fr");
    assert!(subtitle.is_forced);
    assert!(!subtitle.is_sdh);

    // The I-frame playlist is never requested.
    assert!(!fetcher
        .requests
        .borrow()
        .iter()
        .any(|request| request.contains("iframes")));
}

#[test]
fn test_foreign_key_systems_are_dropped() {
    let tracks = load(&url_request("master.m3u8", en()), &presentation(), &config()).unwrap();
    let video = tracks.videos().next().unwrap();

    let drm = &video.source.drm;
    assert_eq!(drm.len(), 1);
    let widevine = &drm[&KeySystem::Widevine];
    assert_eq!(
        widevine.license_url.as_deref(),
        Some("https://license.example.com/widevine")
    );
    assert!(widevine.pssh.as_deref().unwrap().starts_with("AAAAW3Bzc2g"));
}

#[test]
fn test_fairplay_target_keeps_fairplay() {
    let config = EngineConfig {
        key_system: KeySystem::FairPlay,
        ..EngineConfig::default()
    };
    let tracks = load(&url_request("master.m3u8", en()), &presentation(), &config).unwrap();
    let video = tracks.videos().next().unwrap();

    assert!(!video.source.drm.contains_key(&KeySystem::Widevine));
    assert_eq!(
        video.source.drm[&KeySystem::FairPlay].license_url.as_deref(),
        Some("skd://fairplay-key")
    );
}

#[test]
fn test_vendor_drm_section_is_cut() {
    let tracks = load(&url_request("master.m3u8", en()), &presentation(), &config()).unwrap();
    for audio in tracks.audios() {
        assert_eq!(audio.source.segments.segments.len(), 2);
    }
}

#[test]
fn test_embedded_audio_and_default_codecs() {
    let master = r#"#EXTM3U
#EXT-X-STREAM-INF:BANDWIDTH=2500000,RESOLUTION=1280x720,CODECS="avc1.64001f,mp4a.40.2"
720.m3u8
#EXT-X-STREAM-INF:BANDWIDTH=800000,RESOLUTION=640x360
360.m3u8
#EXT-X-STREAM-INF:BANDWIDTH=96000,CODECS="mp4a.40.2"
audio_only.m3u8
"#;
    let media = "#EXTM3U\n#EXT-X-TARGETDURATION:6\n#EXTINF:6.0,\ns1.ts\n#EXT-X-ENDLIST\n";
    let fetcher = MemoryFetch::new()
        .with(&format!("{BASE}720.m3u8"), media)
        .with(&format!("{BASE}360.m3u8"), media)
        .with(&format!("{BASE}audio_only.m3u8"), media);

    let request = text_request(master, Some(&format!("{BASE}master.m3u8")));
    let tracks = load(&request, &fetcher, &config()).unwrap();

    // The audio-only variant is not a video track and the muxed audio is
    // not listed separately.
    assert_eq!(tracks.len(), 2);
    for video in tracks.videos() {
        assert_eq!(video.codec, VideoCodec::Avc);
        assert_eq!(video.embedded_audio, Some(AudioCodec::Aac));
        assert!(video.source.drm.is_empty());
    }
}

#[test]
fn test_audio_only_master_is_not_playable() {
    let master = r#"#EXTM3U
#EXT-X-STREAM-INF:BANDWIDTH=96000,CODECS="mp4a.40.2"
audio.m3u8
"#;
    let fetcher = MemoryFetch::new().with(
        &format!("{BASE}audio.m3u8"),
        "#EXTM3U\n#EXT-X-TARGETDURATION:6\n#EXTINF:6.0,\na1.aac\n#EXT-X-ENDLIST\n",
    );

    let request = text_request(master, Some(&format!("{BASE}master.m3u8")));
    assert!(matches!(
        load(&request, &fetcher, &config()),
        Err(Error::NoPlayableStreams)
    ));
}

#[test]
fn test_media_playlist_trim() {
    let mut request = text_request(VIDEO, Some(&format!("{BASE}video/1080.m3u8")));
    let full = load(&request, &MemoryFetch::new(), &config()).unwrap();
    request.trim = true;
    let trimmed = load(&request, &MemoryFetch::new(), &config()).unwrap();

    let video = full.videos().next().unwrap();
    assert_eq!(video.codec, VideoCodec::Avc);
    assert_eq!(video.embedded_audio, Some(AudioCodec::Aac));
    assert_eq!(video.source.segments.segments.len(), 3);

    // 16s - 6s leaves segments starting at 0s and 6s.
    let segments = &trimmed.videos().next().unwrap().source.segments;
    assert_eq!(segments.segments.len(), 2);
    assert_eq!(segments.duration(), Some(12.0));
}

#[test]
fn test_missing_header_is_malformed() {
    let request = text_request(
        "#EXT-X-STREAM-INF:BANDWIDTH=1\nv.m3u8\n",
        Some(&format!("{BASE}master.m3u8")),
    );
    assert!(matches!(
        load(&request, &MemoryFetch::new(), &config()),
        Err(Error::MalformedManifest(_))
    ));
}

#[test]
fn test_relative_uri_without_base_is_malformed() {
    let request = text_request(MASTER, None);
    let fetcher = MemoryFetch::new();

    assert!(matches!(
        load(&request, &fetcher, &config()),
        Err(Error::MalformedManifest(_))
    ));
    assert!(fetcher.requests.borrow().is_empty());
}

#[test]
fn test_missing_media_playlist_aborts() {
    let fetcher = MemoryFetch::new().with(&format!("{BASE}master.m3u8"), MASTER);
    let error = load(&url_request("master.m3u8", en()), &fetcher, &config()).unwrap_err();
    assert!(matches!(error, Error::HttpStatus { status: 404, .. }));
}

#[test]
fn test_audio_groups_keep_distinct_bitrates() {
    let master = r#"#EXTM3U
#EXT-X-MEDIA:TYPE=AUDIO,GROUP-ID="aac-64",LANGUAGE="en",NAME="English",CHANNELS="2",URI="audio/en_64.m3u8"
#EXT-X-MEDIA:TYPE=AUDIO,GROUP-ID="aac-128",LANGUAGE="en",NAME="English",CHANNELS="2",URI="audio/en_128.m3u8"
#EXT-X-STREAM-INF:BANDWIDTH=800000,RESOLUTION=640x360,CODECS="avc1.64001e,mp4a.40.2",AUDIO="aac-64"
360.m3u8
#EXT-X-STREAM-INF:BANDWIDTH=2500000,RESOLUTION=1280x720,CODECS="avc1.64001f,mp4a.40.2",AUDIO="aac-128"
720.m3u8
"#;
    let fetcher = MemoryFetch::new()
        .with(&format!("{BASE}360.m3u8"), VIDEO)
        .with(&format!("{BASE}720.m3u8"), VIDEO)
        .with(&format!("{BASE}audio/en_64.m3u8"), AUDIO)
        .with(&format!("{BASE}audio/en_128.m3u8"), AUDIO);

    let request = text_request(master, Some(&format!("{BASE}master.m3u8")));
    let tracks = load(&request, &fetcher, &config()).unwrap();

    assert_eq!(tracks.videos().count(), 2);
    let mut playlists: Vec<_> = tracks
        .audios()
        .map(|audio| audio.source.segments.addressing.clone())
        .collect();
    playlists.sort_by_key(|addressing| format!("{addressing:?}"));
    assert_eq!(
        playlists,
        [
            Addressing::Playlist {
                url: format!("{BASE}audio/en_128.m3u8")
            },
            Addressing::Playlist {
                url: format!("{BASE}audio/en_64.m3u8")
            },
        ]
    );
}

#[test]
fn test_every_key_line_is_signaled() {
    let media = r#"#EXTM3U
#EXT-X-TARGETDURATION:6
#EXT-X-KEY:METHOD=SAMPLE-AES,URI="https://license.example.com/widevine",KEYFORMAT="urn:uuid:edef8ba9-79d6-4ace-a3c8-27dcd51d21ed",KEYFORMATVERSIONS="1"
#EXT-X-KEY:METHOD=AES-128,URI="https://keys.example.com/k"
#EXTINF:6.0,
seg1.ts
#EXT-X-ENDLIST
"#;
    let request = text_request(media, Some(&format!("{BASE}video/main.m3u8")));
    let tracks = load(&request, &MemoryFetch::new(), &config()).unwrap();

    let drm = &tracks.videos().next().unwrap().source.drm;
    assert_eq!(drm.len(), 2);
    assert_eq!(
        drm[&KeySystem::Widevine].license_url.as_deref(),
        Some("https://license.example.com/widevine")
    );
    assert_eq!(
        drm[&KeySystem::ClearKey].license_url.as_deref(),
        Some("https://keys.example.com/k")
    );
}

#[test]
fn test_subtitle_accessibility_characteristics() {
    let master = r#"#EXTM3U
#EXT-X-MEDIA:TYPE=SUBTITLES,GROUP-ID="subs",LANGUAGE="en",NAME="English",CHARACTERISTICS="public.accessibility.transcribes-spoken-dialog,public.accessibility.describes-music-and-sound",URI="subs/en_cc.m3u8"
#EXT-X-MEDIA:TYPE=SUBTITLES,GROUP-ID="subs",LANGUAGE="fr",NAME="Francais",URI="subs/fr_forced.m3u8"
#EXT-X-STREAM-INF:BANDWIDTH=2500000,RESOLUTION=1280x720,CODECS="avc1.64001f,mp4a.40.2",SUBTITLES="subs"
720.m3u8
"#;
    let fetcher = MemoryFetch::new()
        .with(&format!("{BASE}720.m3u8"), VIDEO)
        .with(&format!("{BASE}subs/en_cc.m3u8"), SUBTITLES)
        .with(&format!("{BASE}subs/fr_forced.m3u8"), SUBTITLES);

    let request = text_request(master, Some(&format!("{BASE}master.m3u8")));
    let tracks = load(&request, &fetcher, &config()).unwrap();

    let (sdh, plain): (Vec<_>, Vec<_>) = tracks.subtitles().partition(|subtitle| subtitle.is_sdh);
    assert_eq!(sdh.len(), 1);
    assert_eq!(sdh[0].language.as_str(), "en");
    assert_eq!(plain.len(), 1);
    assert_eq!(plain[0].language.as_str(), "fr");
}
