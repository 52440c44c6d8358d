#![forbid(unsafe_code)]

//! Picks the one file rendition a media item resolves to.

use crate::api::MediaFile;

/// Resolution only breaks ties inside a bucket, so it is scaled well below
/// the bucket bonuses.
pub const RESOLUTION_DIVISOR: i64 = 10;
/// Awarded when the resolution is within the configured cap.
pub const QUALITY_CAP_BONUS: i64 = 200;
/// Awarded when the burned-in subtitle flag matches the preference.
pub const SUBTITLE_MATCH_BONUS: i64 = 100;

const AUDIO_ITEM_TYPE: &str = "audio";
const AUDIO_MIME_PREFIX: &str = "audio/";

/// Caller preferences for one selection.
#[derive(Debug, Clone, Copy)]
pub struct SelectionPrefs {
    pub quality_cap: i64,
    pub prefer_subtitled: bool,
    pub audio_only: bool,
}

/// Outcome of [`select_best`].
#[derive(Debug, Clone, Copy)]
pub enum Selection<'a> {
    Selected(&'a MediaFile),
    /// Audio-only mode found nothing with an `audio/` mimetype.
    NoAudio,
    /// The item has no usable files at all.
    Empty,
}

impl<'a> Selection<'a> {
    pub fn file(self) -> Option<&'a MediaFile> {
        match self {
            Selection::Selected(file) => Some(file),
            Selection::NoAudio | Selection::Empty => None,
        }
    }
}

/// Chooses the best file of a media item.
///
/// Audio items take their first file verbatim. In audio-only mode the first
/// `audio/*` file wins and video-only items are rejected rather than falling
/// back to video. Everything else goes through [`video_score`].
pub fn select_best<'a>(item_type: &str, files: &'a [MediaFile], prefs: SelectionPrefs) -> Selection<'a> {
    if item_type == AUDIO_ITEM_TYPE {
        return files.first().map_or(Selection::Empty, Selection::Selected);
    }
    if prefs.audio_only {
        return files
            .iter()
            .find(|file| file.mimetype.starts_with(AUDIO_MIME_PREFIX))
            .map_or(Selection::NoAudio, Selection::Selected);
    }
    best_video(files, prefs.quality_cap, prefs.prefer_subtitled)
        .map_or(Selection::Empty, Selection::Selected)
}

/// Highest scoring file; the first one wins on ties.
pub fn best_video(files: &[MediaFile], quality_cap: i64, prefer_subtitled: bool) -> Option<&MediaFile> {
    let mut best: Option<(&MediaFile, i64)> = None;
    for file in files {
        let score = video_score(file, quality_cap, prefer_subtitled);
        if best.is_none_or(|(_, top)| score > top) {
            best = Some((file, score));
        }
    }
    best.map(|(file, _)| file)
}

/// `resolution / 10`, plus 200 when `0 < resolution <= cap`, plus 100 when
/// the subtitle flag matches the preference.
pub fn video_score(file: &MediaFile, quality_cap: i64, prefer_subtitled: bool) -> i64 {
    let resolution = label_resolution(&file.label);
    let mut score = resolution / RESOLUTION_DIVISOR;
    if resolution > 0 && resolution <= quality_cap {
        score += QUALITY_CAP_BONUS;
    }
    if file.subtitled == prefer_subtitled {
        score += SUBTITLE_MATCH_BONUS;
    }
    score
}

/// `720p` -> 720. Anything unparsable counts as zero.
fn label_resolution(label: &str) -> i64 {
    label
        .strip_suffix('p')
        .unwrap_or(label)
        .parse()
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn video(url: &str, label: &str, subtitled: bool) -> MediaFile {
        MediaFile {
            progressive_download_url: url.into(),
            label: label.into(),
            subtitled,
            mimetype: "video/mp4".into(),
            ..MediaFile::default()
        }
    }

    fn audio(url: &str) -> MediaFile {
        MediaFile {
            progressive_download_url: url.into(),
            mimetype: "audio/mpeg".into(),
            ..MediaFile::default()
        }
    }

    fn prefs(quality_cap: i64, prefer_subtitled: bool) -> SelectionPrefs {
        SelectionPrefs {
            quality_cap,
            prefer_subtitled,
            audio_only: false,
        }
    }

    fn picked<'a>(selection: Selection<'a>) -> &'a str {
        selection
            .file()
            .map(|file| file.progressive_download_url.as_str())
            .unwrap_or("<none>")
    }

    #[test]
    fn picks_highest_quality_under_cap() {
        let files = vec![
            video("720p.mp4", "720p", false),
            video("480p.mp4", "480p", false),
            video("360p.mp4", "360p", false),
        ];
        assert_eq!(picked(select_best("video", &files, prefs(720, false))), "720p.mp4");
    }

    #[test]
    fn scores_match_documented_buckets() {
        let hd = video("720p.mp4", "720p", false);
        let sd = video("480p.mp4", "480p", false);
        assert_eq!(video_score(&hd, 720, false), 372);
        assert_eq!(video_score(&sd, 720, false), 348);
        assert_eq!(video_score(&hd, 720, true), 272);
        assert_eq!(video_score(&sd, 720, true), 248);
    }

    #[test]
    fn quality_cap_outweighs_resolution() {
        let files = vec![
            video("1080p.mp4", "1080p", false),
            video("480p.mp4", "480p", false),
        ];
        assert_eq!(picked(select_best("video", &files, prefs(480, false))), "480p.mp4");
    }

    #[test]
    fn subtitle_preference_breaks_same_resolution() {
        let files = vec![
            video("720p.mp4", "720p", false),
            video("720p_sub.mp4", "720p", true),
        ];
        assert_eq!(picked(select_best("video", &files, prefs(720, true))), "720p_sub.mp4");
        assert_eq!(picked(select_best("video", &files, prefs(720, false))), "720p.mp4");
    }

    #[test]
    fn unmatched_subtitle_preference_still_ranks_resolution() {
        let files = vec![
            video("720p.mp4", "720p", false),
            video("480p.mp4", "480p", false),
        ];
        assert_eq!(picked(select_best("video", &files, prefs(720, true))), "720p.mp4");
    }

    #[test]
    fn ties_keep_first_candidate() {
        let files = vec![video("first.mp4", "720p", false), video("second.mp4", "720p", false)];
        assert_eq!(picked(select_best("video", &files, prefs(720, false))), "first.mp4");
    }

    #[test]
    fn unparsable_labels_score_zero_resolution() {
        let odd = video("odd.mp4", "HD", false);
        assert_eq!(video_score(&odd, 720, false), SUBTITLE_MATCH_BONUS);
        let files = vec![odd, video("240p.mp4", "240p", true)];
        assert_eq!(picked(select_best("video", &files, prefs(720, false))), "240p.mp4");
    }

    #[test]
    fn empty_list_selects_nothing() {
        assert!(matches!(select_best("video", &[], prefs(720, false)), Selection::Empty));
        assert!(matches!(select_best("audio", &[], prefs(720, false)), Selection::Empty));
    }

    #[test]
    fn audio_items_take_first_file_verbatim() {
        let files = vec![video("a.mp4", "240p", false), audio("b.mp3")];
        assert_eq!(picked(select_best("audio", &files, prefs(720, false))), "a.mp4");
    }

    #[test]
    fn audio_only_mode_finds_audio_file() {
        let files = vec![video("a.mp4", "720p", false), audio("b.mp3"), audio("c.mp3")];
        let only_audio = SelectionPrefs {
            audio_only: true,
            ..prefs(720, false)
        };
        assert_eq!(picked(select_best("video", &files, only_audio)), "b.mp3");
    }

    #[test]
    fn audio_only_mode_rejects_video_only_items() {
        let files = vec![video("a.mp4", "720p", false)];
        let only_audio = SelectionPrefs {
            audio_only: true,
            ..prefs(720, false)
        };
        assert!(matches!(
            select_best("video", &files, only_audio),
            Selection::NoAudio
        ));
    }
}
