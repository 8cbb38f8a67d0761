mod common;

use common::{config, en, url, MemoryFetch};
use streamtrack::tracks::audio::AudioCodec;
use streamtrack::tracks::video::{DynamicRange, VideoCodec};
use streamtrack::tracks::Origin;
use streamtrack::{
    build_tracks, load, Error, KeySystem, LoadRequest, ManifestDocument, ManifestKind,
    ManifestSource, ParseContext, StreamingManifest, TrackSet,
};

const MANIFEST_URL: &str = "https://cdn.example.com/title/manifest.mpd";

fn text_request(body: &str, trim: bool) -> LoadRequest {
    LoadRequest {
        source: ManifestSource::Text {
            body: body.to_string(),
            url: Some(url(MANIFEST_URL)),
        },
        kind: ManifestKind::Dash,
        language: en(),
        trim,
    }
}

fn load_text(body: &str) -> streamtrack::Result<TrackSet> {
    load(&text_request(body, false), &MemoryFetch::new(), &config())
}

const FEATURE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<MPD xmlns="urn:mpeg:dash:schema:mpd:2011" type="static" mediaPresentationDuration="PT1H2M3S">
  <Period id="main">
    <AdaptationSet contentType="video" mimeType="video/mp4" lang="en">
      <Representation id="v1080" bandwidth="6000000" codecs="avc1.640028" width="1920" height="1080" frameRate="25">
        <BaseURL>video_1080.mp4</BaseURL>
      </Representation>
    </AdaptationSet>
    <AdaptationSet contentType="audio" mimeType="audio/mp4" lang="en">
      <Role schemeIdUri="urn:mpeg:dash:role:2011" value="description"/>
      <AudioChannelConfiguration schemeIdUri="urn:mpeg:dash:23003:3:audio_channel_configuration:2011" value="2"/>
      <Representation id="ad" bandwidth="128000" codecs="mp4a.40.2" audioSamplingRate="48000">
        <BaseURL>audio_ad.mp4</BaseURL>
      </Representation>
    </AdaptationSet>
  </Period>
</MPD>"#;

#[test]
fn test_video_and_descriptive_audio() {
    let tracks = load_text(FEATURE).unwrap();

    assert_eq!(tracks.len(), 2);
    let video = tracks.videos().next().unwrap();
    assert_eq!(video.codec, VideoCodec::Avc);
    assert_eq!((video.width, video.height), (Some(1920), Some(1080)));
    assert_eq!(video.frame_rate, Some(25.0));
    assert_eq!(video.range, DynamicRange::Sdr);
    assert_eq!(video.language.as_str(), "en");
    assert_eq!(video.source.url, "https://cdn.example.com/title/video_1080.mp4");
    assert!(video.source.drm.is_empty());

    let audio = tracks.audios().next().unwrap();
    assert!(audio.is_descriptive);
    assert_eq!(audio.codec, AudioCodec::Aac);
    assert_eq!(audio.channels.as_deref(), Some("2.0"));
    assert_eq!(audio.sampling_rate, Some(48_000));
}

#[test]
fn test_dubbed_role_is_not_descriptive() {
    let tracks = load_text(&FEATURE.replace(r#"value="description""#, r#"value="dubbed""#)).unwrap();
    assert!(!tracks.audios().next().unwrap().is_descriptive);
}

#[test]
fn test_origin_back_reference() {
    let tracks = load_text(FEATURE).unwrap();
    let audio = tracks.audios().next().unwrap();

    match &audio.source.origin {
        Origin::Dash {
            period_index,
            period_id,
            adaptation_set,
            representation,
        } => {
            assert_eq!(*period_index, 0);
            assert_eq!(period_id.as_deref(), Some("main"));
            assert_eq!(adaptation_set.roles[0].value.as_deref(), Some("description"));
            assert!(adaptation_set.representations.is_empty());
            assert_eq!(representation.id.as_deref(), Some("ad"));
        }
        other => panic!("unexpected origin {:?}", other),
    }
}

#[test]
fn test_periods_repeating_streams_are_deduplicated() {
    let period = |id: &str| {
        format!(
            r#"<Period id="{id}" duration="PT30S">
              <AdaptationSet contentType="video" lang="en">
                <SegmentTemplate timescale="1" duration="2" media="{id}/$RepresentationID$/$Number$.m4s"/>
                <Representation id="hd" bandwidth="5000000" codecs="avc1.640028" width="1920" height="1080"/>
                <Representation id="sd" bandwidth="1500000" codecs="avc1.4d401f" width="960" height="540"/>
              </AdaptationSet>
              <AdaptationSet contentType="video" lang="en">
                <SegmentTemplate timescale="1" duration="2" media="{id}/hevc/$Number$.m4s"/>
                <Representation id="hevc" bandwidth="4000000" codecs="hvc1.1.6.L120.90" width="1920" height="1080"/>
              </AdaptationSet>
            </Period>"#
        )
    };
    let mpd = format!(
        r#"<MPD mediaPresentationDuration="PT1M30S">{}{}{}</MPD>"#,
        period("p0"),
        period("ad-break"),
        period("p1")
    );

    let tracks = load_text(&mpd).unwrap();
    // (AVC, en, 1080p), (AVC, en, 540p), (HEVC, en, 1080p)
    assert_eq!(tracks.videos().count(), 3);
    assert_eq!(tracks.len(), 3);

    // The first occurrence wins.
    let first = tracks.videos().next().unwrap();
    assert!(first.source.segments.segments[0].url.contains("/p0/"));
}

#[test]
fn test_same_representation_built_twice() {
    let fetcher = MemoryFetch::new();
    let ctx = ParseContext::new(&fetcher, KeySystem::Widevine);
    let document = ManifestDocument::parse(
        &ManifestSource::Text {
            body: FEATURE.to_string(),
            url: Some(url(MANIFEST_URL)),
        },
        ManifestKind::Dash,
        &ctx,
    )
    .unwrap();

    let mut tracks = build_tracks(&document, &en()).unwrap();
    tracks.merge(build_tracks(&document, &en()).unwrap());
    assert_eq!(tracks.len(), 2);
}

#[test]
fn test_language_falls_back_to_default() {
    let mpd = r#"<MPD mediaPresentationDuration="PT1M">
      <Period>
        <AdaptationSet contentType="video" lang="und">
          <Representation id="v" bandwidth="1" codecs="avc1.64001f" width="1280" height="720"/>
        </AdaptationSet>
        <AdaptationSet contentType="text" mimeType="text/vtt" lang="pt-br">
          <Label>Portuguese (SDH)</Label>
          <Representation id="s" bandwidth="1"><BaseURL>subs_pt.vtt</BaseURL></Representation>
        </AdaptationSet>
      </Period>
    </MPD>"#;

    let request = LoadRequest {
        language: "ja".parse().unwrap(),
        ..text_request(mpd, false)
    };
    let tracks = load(&request, &MemoryFetch::new(), &config()).unwrap();

    assert_eq!(tracks.videos().next().unwrap().language.as_str(), "ja");
    let subtitle = tracks.subtitles().next().unwrap();
    assert_eq!(subtitle.language.as_str(), "pt-BR");
    assert!(subtitle.is_sdh);
    assert!(!subtitle.is_forced);
}

#[test]
fn test_trim_shortens_template_expansion() {
    let mpd = r#"<MPD mediaPresentationDuration="PT10M0S">
      <Period>
        <AdaptationSet contentType="video">
          <SegmentTemplate timescale="1000" duration="4000" media="$RepresentationID$_$Number$.m4s"/>
          <Representation id="v" bandwidth="1" codecs="avc1.640028" width="1920" height="1080"/>
        </AdaptationSet>
      </Period>
    </MPD>"#;

    let full = load(&text_request(mpd, false), &MemoryFetch::new(), &config()).unwrap();
    let trimmed = load(&text_request(mpd, true), &MemoryFetch::new(), &config()).unwrap();

    let count = |tracks: &TrackSet| tracks.videos().next().unwrap().source.segments.segments.len();
    assert_eq!(count(&full), 150);
    assert_eq!(count(&trimmed), 149);
}

#[test]
fn test_trim_rewrites_duration() {
    let fetcher = MemoryFetch::new();
    let ctx = ParseContext::new(&fetcher, KeySystem::Widevine);
    let document = streamtrack::Dash::from_text(
        r#"<MPD mediaPresentationDuration="PT10M0S"><Period/></MPD>"#,
        None,
        &ctx,
    )
    .unwrap();

    let trimmed = document.trim_trailing_segment(6.0).unwrap();
    assert_eq!(
        trimmed.mpd.media_presentation_duration.as_deref(),
        Some("PT9M54S")
    );
    assert_eq!(trimmed.duration_secs(), Some(594.0));

    let again = trimmed.trim_trailing_segment(6.0).unwrap();
    assert_eq!(again.duration_secs(), Some(594.0));
}

#[test]
fn test_trim_too_short() {
    let mpd = r#"<MPD mediaPresentationDuration="PT0M5S">
      <Period>
        <AdaptationSet contentType="video">
          <Representation id="v" bandwidth="1" codecs="avc1.640028" width="1920" height="1080"/>
        </AdaptationSet>
      </Period>
    </MPD>"#;

    let result = load(&text_request(mpd, true), &MemoryFetch::new(), &config());
    assert!(matches!(result, Err(Error::ManifestTooShort { .. })));
}

#[test]
fn test_audio_only_is_not_playable() {
    let mpd = r#"<MPD mediaPresentationDuration="PT1M">
      <Period>
        <AdaptationSet contentType="audio" lang="en">
          <Representation id="a" bandwidth="128000" codecs="mp4a.40.2"/>
        </AdaptationSet>
      </Period>
    </MPD>"#;

    assert!(matches!(load_text(mpd), Err(Error::NoPlayableStreams)));
}

#[test]
fn test_malformed_input() {
    assert!(matches!(load_text("<not-xml"), Err(Error::MalformedManifest(_))));
    assert!(matches!(
        load_text("{\"not\": \"a manifest\"}"),
        Err(Error::MalformedManifest(_))
    ));
    assert!(matches!(
        load_text("<Playlist><Entry/></Playlist>"),
        Err(Error::MalformedManifest(_))
    ));
}

#[test]
fn test_load_from_url() {
    let fetcher = MemoryFetch::new().with(MANIFEST_URL, FEATURE);
    let request = LoadRequest {
        source: ManifestSource::Url(url(MANIFEST_URL)),
        kind: ManifestKind::Dash,
        language: en(),
        trim: false,
    };

    let tracks = load(&request, &fetcher, &config()).unwrap();
    assert_eq!(tracks.len(), 2);
    assert_eq!(fetcher.requests.borrow().as_slice(), [MANIFEST_URL]);
}

#[test]
fn test_network_failure_propagates() {
    let request = LoadRequest {
        source: ManifestSource::Url(url(MANIFEST_URL)),
        kind: ManifestKind::Dash,
        language: en(),
        trim: false,
    };

    let error = load(&request, &MemoryFetch::new(), &config()).unwrap_err();
    assert!(error.is_network());
}

#[test]
fn test_protected_stream_license_targets() {
    let mpd = r#"<MPD xmlns:cenc="urn:mpeg:cenc:2013" xmlns:ms="urn:microsoft" mediaPresentationDuration="PT1M">
      <Period>
        <AdaptationSet contentType="video">
          <ContentProtection schemeIdUri="urn:mpeg:dash:mp4protection:2011" value="cenc"
              cenc:default_KID="a1b2c3d4-0000-1111-2222-333344445555"/>
          <ContentProtection schemeIdUri="urn:uuid:9a04f079-9840-4286-ab92-e65be0885f95">
            <ms:laurl licenseUrl="https://license.example.com/playready"/>
          </ContentProtection>
          <ContentProtection schemeIdUri="urn:uuid:edef8ba9-79d6-4ace-a3c8-27dcd51d21ed">
            <cenc:pssh>AAAAW3Bzc2gAAAAA7e+LqXnWSs6jyCfc1R0h7QAAADsIARIQ</cenc:pssh>
          </ContentProtection>
          <Representation id="v" bandwidth="1" codecs="avc1.640028" width="1920" height="1080"/>
        </AdaptationSet>
      </Period>
    </MPD>"#;

    let tracks = load_text(mpd).unwrap();
    let track = tracks.iter().next().unwrap();
    assert!(track.is_encrypted());
    assert_eq!(
        track.license_targets(),
        vec![(KeySystem::PlayReady, "https://license.example.com/playready")]
    );

    let drm = &track.source().unwrap().drm;
    let widevine = &drm[&KeySystem::Widevine];
    assert!(widevine.pssh.as_deref().unwrap().starts_with("AAAAW3Bzc2g"));
    assert_eq!(
        widevine.default_kid.as_deref(),
        Some("a1b2c3d4000011112222333344445555")
    );
}
