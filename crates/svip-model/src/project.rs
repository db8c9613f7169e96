//! Builders for the common project objects and a read-only project summary.
//!
//! Builders fill every field the way the editor initializes it, so a project
//! assembled from them encodes to what X Studio itself would write.

use std::sync::Arc;

use nrbf_graph::{ClassSpec, Object, Value};
use serde::Serialize;

use crate::error::{SvipError, SvipResult};
use crate::schema::{
    XsClass, APP_MODEL, BEAT_SIZE, INSTRUMENT_TRACK, ITRACK, LIST, LIST_VERSION_ITRACK,
    LIST_VERSION_NOTE, LIST_VERSION_SONG_BEAT, LIST_VERSION_SONG_TEMPO, NOTE, NOTE_HEAD_TAG,
    OVERLAPPABLE_LIST, REVERB_PRESET, SINGING_TRACK, SONG_BEAT, SONG_TEMPO,
};

/// `ReverbPreset` value meaning no reverb.
pub const REVERB_NONE: i32 = -1;

/// Marker on the first phoneme of a note.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub enum HeadTag {
    #[default]
    NoTag = 0,
    SilTag = 1,
    SpTag = 2,
}

impl HeadTag {
    pub fn from_value(value: i32) -> Option<Self> {
        match value {
            0 => Some(Self::NoTag),
            1 => Some(Self::SilTag),
            2 => Some(Self::SpTag),
            _ => None,
        }
    }
}

/// Tempo marker. The editor stores beats per minute times 100.
pub fn song_tempo(pos: i32, bpm: f64) -> SvipResult<Object> {
    Ok(Object::new(&SONG_TEMPO)
        .with("pos", pos)?
        .with("tempo", (bpm * 100.0).round() as i32)?)
}

/// Time signature starting at `bar_index`.
pub fn song_beat(bar_index: i32, numerator: i32, denominator: i32) -> SvipResult<Object> {
    let size = Object::new(&BEAT_SIZE)
        .with("x", numerator)?
        .with("y", denominator)?;
    Ok(Object::new(&SONG_BEAT)
        .with("bar_index", bar_index)?
        .with("beat_size", size)?)
}

pub fn head_tag(tag: HeadTag) -> SvipResult<Object> {
    Ok(Object::new(&NOTE_HEAD_TAG).with("value", tag as i32)?)
}

pub fn reverb_preset(value: i32) -> SvipResult<Object> {
    Ok(Object::new(&REVERB_PRESET).with("value", value)?)
}

/// A note with the editor's defaults for everything but position and lyric.
pub fn note(start_pos: i32, width_pos: i32, key_index: i32, lyric: &str) -> SvipResult<Object> {
    Ok(Object::new(&NOTE)
        .with("start_pos", start_pos)?
        .with("width_pos", width_pos)?
        .with("key_index", key_index)?
        .with("lyric", lyric)?
        .with("head_tag", head_tag(HeadTag::NoTag)?)?)
}

/// `List<item>` holding `items`, with its size set.
pub fn list(item: &'static ClassSpec, items: Vec<Value>, version: i32) -> SvipResult<Arc<Object>> {
    let size = i32::try_from(items.len())
        .map_err(|_| SvipError::Shape(format!("{} items do not fit a list", items.len())))?;
    Ok(Object::new(&LIST)
        .with_type_arg(item)
        .with("items", items)?
        .with("size", size)?
        .with("version", version)?
        .into_shared())
}

/// `SerialOverlapableItemList<item>`; both buffer fields share one list.
pub fn overlappable_list(
    item: &'static ClassSpec,
    items: Vec<Value>,
    version: i32,
) -> SvipResult<Object> {
    let buf = list(item, items, version)?;
    Ok(Object::new(&OVERLAPPABLE_LIST)
        .with_type_arg(item)
        .with("buf", Arc::clone(&buf))?
        .with("buf_1", buf)?)
}

pub fn singing_track(name: &str, notes: Vec<Object>) -> SvipResult<Object> {
    let notes = notes.into_iter().map(Value::from).collect();
    Ok(Object::new(&SINGING_TRACK)
        .with("name", name)?
        .with("volume", 0.7)?
        .with("note_list", overlappable_list(&NOTE, notes, LIST_VERSION_NOTE)?)?
        .with("reverb_preset", reverb_preset(REVERB_NONE)?)?)
}

pub fn instrument_track(name: &str, file_path: &str) -> SvipResult<Object> {
    Ok(Object::new(&INSTRUMENT_TRACK)
        .with("name", name)?
        .with("volume", 0.3)?
        .with("sample_rate", 48_000.0)?
        .with("instrument_file_path", file_path)?)
}

/// Project root with the editor's view defaults.
pub fn app_model(tempos: Vec<Object>, beats: Vec<Object>, tracks: Vec<Object>) -> SvipResult<Object> {
    let into_values = |objects: Vec<Object>| objects.into_iter().map(Value::from).collect();
    Ok(Object::new(&APP_MODEL)
        .with(
            "tempo_list",
            overlappable_list(&SONG_TEMPO, into_values(tempos), LIST_VERSION_SONG_TEMPO)?,
        )?
        .with(
            "beat_list",
            overlappable_list(&SONG_BEAT, into_values(beats), LIST_VERSION_SONG_BEAT)?,
        )?
        .with("track_list", list(&ITRACK, into_values(tracks), LIST_VERSION_ITRACK)?)?
        .with("quantize", 8)?
        .with("is_numerical_key_name", true)?
        .with("actual_project_file_path", Value::Null)?)
}

/// Logical items behind a `List<T>` or `SerialOverlapableItemList<T>` field.
pub fn list_items(value: &Value) -> SvipResult<&[Value]> {
    let Some(object) = value.as_object() else {
        return Ok(&[]);
    };
    let object = match XsClass::of(object.class()) {
        Some(XsClass::OverlappableList) => match object.field("buf")?.as_object() {
            Some(buf) => buf,
            None => return Ok(&[]),
        },
        Some(XsClass::List) => object,
        _ => {
            return Err(SvipError::Shape(format!(
                "{} is not a list",
                object.class().name
            )))
        }
    };
    Ok(object.collection_items().unwrap_or(&[]))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Singing,
    Instrument,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TempoSummary {
    pub pos: i32,
    pub bpm: f64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BeatSummary {
    pub bar_index: i32,
    pub numerator: i32,
    pub denominator: i32,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TrackSummary {
    pub kind: TrackKind,
    pub name: String,
    pub mute: bool,
    pub solo: bool,
    pub volume: f64,
    pub notes: usize,
}

/// What `svip info` prints.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProjectSummary {
    pub version: String,
    pub tempos: Vec<TempoSummary>,
    pub beats: Vec<BeatSummary>,
    pub tracks: Vec<TrackSummary>,
}

impl ProjectSummary {
    pub fn of(version: &str, root: &Object) -> SvipResult<Self> {
        if XsClass::of(root.class()) != Some(XsClass::AppModel) {
            return Err(SvipError::Shape(format!(
                "root is {}, not an app model",
                root.class().name
            )));
        }
        let tempos = objects(list_items(root.field("tempo_list")?)?)
            .map(|tempo| {
                Ok(TempoSummary {
                    pos: int(tempo, "pos")?,
                    bpm: f64::from(int(tempo, "tempo")?) / 100.0,
                })
            })
            .collect::<SvipResult<_>>()?;
        let beats = objects(list_items(root.field("beat_list")?)?)
            .map(|beat| {
                let size = beat.field("beat_size")?.as_object();
                Ok(BeatSummary {
                    bar_index: int(beat, "bar_index")?,
                    numerator: size.map(|s| int(s, "x")).transpose()?.unwrap_or(0),
                    denominator: size.map(|s| int(s, "y")).transpose()?.unwrap_or(0),
                })
            })
            .collect::<SvipResult<_>>()?;
        let tracks = objects(list_items(root.field("track_list")?)?)
            .map(track_summary)
            .collect::<SvipResult<_>>()?;
        Ok(Self {
            version: version.to_owned(),
            tempos,
            beats,
            tracks,
        })
    }
}

fn track_summary(track: &Arc<Object>) -> SvipResult<TrackSummary> {
    let (kind, notes) = match XsClass::of(track.class()) {
        Some(XsClass::SingingTrack) => (
            TrackKind::Singing,
            list_items(track.field("note_list")?)?.len(),
        ),
        Some(XsClass::InstrumentTrack) => (TrackKind::Instrument, 0),
        _ => {
            return Err(SvipError::Shape(format!(
                "{} is not a track",
                track.class().name
            )))
        }
    };
    Ok(TrackSummary {
        kind,
        name: track.field("name")?.as_str().unwrap_or_default().to_owned(),
        mute: track.field("mute")?.as_bool().unwrap_or(false),
        solo: track.field("solo")?.as_bool().unwrap_or(false),
        volume: track.field("volume")?.as_f64().unwrap_or(0.0),
        notes,
    })
}

fn objects(items: &[Value]) -> impl Iterator<Item = &Arc<Object>> {
    items.iter().filter_map(Value::as_object)
}

fn int(object: &Object, field: &str) -> SvipResult<i32> {
    object.field(field)?.as_i32().ok_or_else(|| {
        SvipError::Shape(format!("{}.{field} is not an int", object.class().name))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_project() -> Object {
        let vocal = singing_track(
            "Vocal",
            vec![note(0, 480, 60, "la").unwrap(), note(480, 240, 62, "li").unwrap()],
        )
        .unwrap();
        app_model(
            vec![song_tempo(0, 120.0).unwrap(), song_tempo(1920, 90.5).unwrap()],
            vec![song_beat(0, 4, 4).unwrap()],
            vec![vocal, instrument_track("Backing", "backing.wav").unwrap()],
        )
        .unwrap()
    }

    #[test]
    fn tempo_is_stored_times_100() {
        let tempo = song_tempo(0, 120.0).unwrap();
        assert_eq!(tempo.get("tempo").and_then(Value::as_i32), Some(12000));
    }

    #[test]
    fn overlappable_list_shares_buffer() {
        let bag = overlappable_list(&SONG_TEMPO, vec![], LIST_VERSION_SONG_TEMPO).unwrap();
        let buf = bag.get("buf").and_then(Value::as_object).unwrap();
        let buf_1 = bag.get("buf_1").and_then(Value::as_object).unwrap();
        assert!(Arc::ptr_eq(buf, buf_1));
        assert_eq!(buf.type_arg().map(|c| c.name), Some(SONG_TEMPO.name));
        assert_eq!(buf.get("version").and_then(Value::as_i32), Some(2));
    }

    #[test]
    fn editor_defaults() {
        let track = singing_track("Vocal", vec![]).unwrap();
        assert_eq!(track.get("volume").and_then(Value::as_f64), Some(0.7));
        assert!(track.get("edited_pitch_line").is_some_and(Value::is_null));
        let reverb = track.get("reverb_preset").and_then(Value::as_object).unwrap();
        assert_eq!(reverb.get("value").and_then(Value::as_i32), Some(REVERB_NONE));

        let model = app_model(vec![], vec![], vec![]).unwrap();
        assert_eq!(model.get("quantize").and_then(Value::as_i32), Some(8));
        assert_eq!(model.get("is_numerical_key_name").and_then(Value::as_bool), Some(true));
        assert!(model.get("actual_project_file_path").is_some_and(Value::is_null));
    }

    #[test]
    fn summary_reads_lists() {
        let summary = ProjectSummary::of("SVIP7.0.0", &sample_project()).unwrap();
        assert_eq!(summary.tempos[1], TempoSummary { pos: 1920, bpm: 90.5 });
        assert_eq!(
            summary.beats,
            [BeatSummary {
                bar_index: 0,
                numerator: 4,
                denominator: 4
            }]
        );
        assert_eq!(summary.tracks.len(), 2);
        assert_eq!(summary.tracks[0].kind, TrackKind::Singing);
        assert_eq!(summary.tracks[0].notes, 2);
        assert_eq!(summary.tracks[1].kind, TrackKind::Instrument);
        assert_eq!(summary.tracks[1].volume, 0.3);
    }

    #[test]
    fn summary_rejects_other_roots() {
        let err = ProjectSummary::of("SVIP7.0.0", &song_tempo(0, 60.0).unwrap()).unwrap_err();
        assert!(matches!(err, SvipError::Shape(_)));
    }

    #[test]
    fn head_tag_values() {
        assert_eq!(HeadTag::from_value(2), Some(HeadTag::SpTag));
        assert_eq!(HeadTag::from_value(7), None);
        let tag = head_tag(HeadTag::SilTag).unwrap();
        assert_eq!(tag.get("value").and_then(Value::as_i32), Some(1));
    }
}
