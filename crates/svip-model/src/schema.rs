//! The X Studio class tables.
//!
//! Field declaration order follows the editor's own classes (inherited fields
//! first); the `order` column is the priority the editor's serializer writes
//! members in.

use nrbf_graph::{
    ClassRole, ClassSpec, FieldKind, FieldSpec, FormatVersion, Schema, TypeArg, Value,
};
use nrbf_types::PrimitiveType;

pub const MODEL_LIBRARY: &str =
    "SingingTool.Model, Version=1.0.0.0, Culture=neutral, PublicKeyToken=null";
pub const LIBRARY_LIBRARY: &str =
    "SingingTool.Library, Version=1.0.0.0, Culture=neutral, PublicKeyToken=null";

/// `_version` counters the editor stores on its lists.
pub const LIST_VERSION_SONG_TEMPO: i32 = 2;
pub const LIST_VERSION_SONG_BEAT: i32 = 2;
pub const LIST_VERSION_ITRACK: i32 = 4;
pub const LIST_VERSION_NOTE: i32 = 1054;

/// The only version that carries `_editedPowerLine`.
pub const POWER_LINE_VERSION: FormatVersion = FormatVersion::new(7, 0, 0);

const fn int(name: &'static str, alias: &'static str, order: i32) -> FieldSpec {
    FieldSpec::new(name, alias, order, FieldKind::Primitive(PrimitiveType::Int32))
}

const fn boolean(name: &'static str, alias: &'static str, order: i32) -> FieldSpec {
    FieldSpec::new(name, alias, order, FieldKind::Primitive(PrimitiveType::Boolean))
}

const fn single(name: &'static str, alias: &'static str, order: i32) -> FieldSpec {
    FieldSpec::new(name, alias, order, FieldKind::Primitive(PrimitiveType::Single))
}

const fn double(name: &'static str, alias: &'static str, order: i32) -> FieldSpec {
    FieldSpec::new(name, alias, order, FieldKind::Primitive(PrimitiveType::Double))
}

const fn string(name: &'static str, alias: &'static str, order: i32) -> FieldSpec {
    FieldSpec::new(name, alias, order, FieldKind::String)
}

const fn object(
    name: &'static str,
    alias: &'static str,
    order: i32,
    class: &'static ClassSpec,
) -> FieldSpec {
    FieldSpec::new(
        name,
        alias,
        order,
        FieldKind::Object {
            class,
            type_arg: TypeArg::None,
        },
    )
}

const fn generic(
    name: &'static str,
    alias: &'static str,
    order: i32,
    class: &'static ClassSpec,
    type_arg: TypeArg,
) -> FieldSpec {
    FieldSpec::new(name, alias, order, FieldKind::Object { class, type_arg })
}

fn has_power_line(version: &FormatVersion) -> bool {
    *version == POWER_LINE_VERSION
}

/// A line whose blob is missing or empty is written as a null reference.
fn empty_line(value: &Value) -> bool {
    value.as_object().is_some_and(|line| match line.get("line_param") {
        None | Some(Value::Null) => true,
        Some(blob) => blob.as_bytes().is_some_and(|b| b.is_empty()),
    })
}

const fn line(name: &'static str, alias: &'static str, order: i32) -> FieldSpec {
    object(name, alias, order, &LINE_PARAM).null_if(empty_line)
}

const OVERLAPPED: FieldSpec = boolean("overlapped", "<Overlaped>k__BackingField", 6);

pub static APP_MODEL: ClassSpec = ClassSpec {
    name: "SingingTool.Model.AppModel",
    library: Some(MODEL_LIBRARY),
    role: ClassRole::Reference,
    fields: &[
        string("project_file_path", "<ProjectFilePath>k__BackingField", 0),
        generic("tempo_list", "_tempoList", 1, &OVERLAPPABLE_LIST, TypeArg::Fixed(&SONG_TEMPO)),
        generic("beat_list", "_beatList", 2, &OVERLAPPABLE_LIST, TypeArg::Fixed(&SONG_BEAT)),
        generic("track_list", "_trackList", 3, &LIST, TypeArg::Fixed(&ITRACK)),
        int("quantize", "_quantize", 4),
        boolean("is_triplet", "_isTriplet", 5),
        boolean("is_numerical_key_name", "_isNumerialKeyName", 6),
        int("first_numerical_key_name_at_index", "_firstNumerialKeyNameAtIndex", 7),
        string("actual_project_file_path", "<ActualProjectFilePath>k__BackingField", 8),
    ],
};

pub static BEAT_SIZE: ClassSpec = ClassSpec {
    name: "SingingTool.Model.SingingGeneralConcept.BeatSize",
    library: Some(MODEL_LIBRARY),
    role: ClassRole::Reference,
    fields: &[int("x", "_x", 0), int("y", "_y", 1)],
};

pub static SONG_BEAT: ClassSpec = ClassSpec {
    name: "SingingTool.Model.SingingGeneralConcept.SongBeat",
    library: Some(MODEL_LIBRARY),
    role: ClassRole::Reference,
    fields: &[
        OVERLAPPED,
        int("bar_index", "_barIndex", 0),
        object("beat_size", "_beatSize", 1, &BEAT_SIZE),
    ],
};

pub static SONG_TEMPO: ClassSpec = ClassSpec {
    name: "SingingTool.Model.SingingGeneralConcept.SongTempo",
    library: Some(MODEL_LIBRARY),
    role: ClassRole::Reference,
    fields: &[OVERLAPPED, int("pos", "_pos", 0), int("tempo", "_tempo", 1)],
};

pub static LINE_PARAM: ClassSpec = ClassSpec {
    name: "SingingTool.Model.Line.LineParam",
    library: Some(MODEL_LIBRARY),
    role: ClassRole::Reference,
    fields: &[FieldSpec::new(
        "line_param",
        "LineParam",
        0,
        FieldKind::PrimitiveArray(PrimitiveType::Byte),
    )],
};

pub static VIBRATO_STYLE: ClassSpec = ClassSpec {
    name: "SingingTool.Model.VibratoStyle",
    library: Some(MODEL_LIBRARY),
    role: ClassRole::Reference,
    fields: &[
        object("amp_line", "_ampLine", 0, &LINE_PARAM),
        object("freq_line", "_freqLine", 1, &LINE_PARAM),
        boolean("is_anti_phase", "<IsAntiPhase>k__BackingField", 0),
    ],
};

pub static VIBRATO_PERCENT_INFO: ClassSpec = ClassSpec {
    name: "SingingTool.Model.VibratoPercentInfo",
    library: Some(MODEL_LIBRARY),
    role: ClassRole::Reference,
    fields: &[
        single("start_percent", "_startPercent", 0),
        single("end_percent", "_endPercent", 1),
    ],
};

pub static NOTE_PHONE_INFO: ClassSpec = ClassSpec {
    name: "SingingTool.Model.NotePhoneInfo",
    library: Some(MODEL_LIBRARY),
    role: ClassRole::Reference,
    fields: &[
        single("head_phone_time_in_sec", "<HeadPhoneTimeInSec>k__BackingField", 0),
        single(
            "mid_part_over_tail_part_ratio",
            "<MidPartOverTailPartRatio>k__BackingField",
            1,
        ),
    ],
};

/// Enum wrapper: `NoTag = 0`, `SilTag = 1`, `SpTag = 2`.
pub static NOTE_HEAD_TAG: ClassSpec = ClassSpec {
    name: "SingingTool.Model.NoteHeadTag",
    library: Some(MODEL_LIBRARY),
    role: ClassRole::Value,
    fields: &[int("value", "value__", 0)],
};

/// Enum wrapper: `-1` is no reverb, `0` the default preset, then the hall,
/// room, plate and long presets in editor order.
pub static REVERB_PRESET: ClassSpec = ClassSpec {
    name: "SingingTool.Library.Audio.ReverbPreset",
    library: Some(LIBRARY_LIBRARY),
    role: ClassRole::Value,
    fields: &[int("value", "value__", 0)],
};

pub static NOTE: ClassSpec = ClassSpec {
    name: "SingingTool.Model.Note",
    library: Some(MODEL_LIBRARY),
    role: ClassRole::Reference,
    fields: &[
        OVERLAPPED,
        int("start_pos", "_startPos", 0),
        int("width_pos", "_widthPos", 1),
        int("key_index", "_keyIndex", 2),
        string("lyric", "_lyric", 3),
        string("pronouncing", "_pronouncing", 4),
        object("head_tag", "_headTag", 5, &NOTE_HEAD_TAG),
        object("note_phone_info", "<NotePhoneInfo>k__BackingField", 7, &NOTE_PHONE_INFO),
        int("vibrato_percent", "<VibratoPercent>k__BackingField", 8),
        object("vibrato", "<Vibrato>k__BackingField", 9, &VIBRATO_STYLE),
        object(
            "vibrato_percent_info",
            "<VibratoPercentInfo>k__BackingField",
            10,
            &VIBRATO_PERCENT_INFO,
        ),
    ],
};

/// `List<T>`: a padded backing array plus its logical size.
pub static LIST: ClassSpec = ClassSpec {
    name: "System.Collections.Generic.List",
    library: None,
    role: ClassRole::Collection {
        items: "items",
        size: "size",
    },
    fields: &[
        FieldSpec::new(
            "items",
            "_items",
            0,
            FieldKind::List {
                element: TypeArg::Inherit,
            },
        ),
        int("size", "_size", 1),
        int("version", "_version", 2),
    ],
};

/// The editor's list wrapper; both fields point at one shared `List<T>`.
pub static OVERLAPPABLE_LIST: ClassSpec = ClassSpec {
    name: "SingingTool.Library.SerialOverlapableItemList",
    library: Some(LIBRARY_LIBRARY),
    role: ClassRole::Reference,
    fields: &[
        generic("buf", "_buf", 0, &LIST, TypeArg::Inherit),
        generic("buf_1", "SerialItemList`1+_buf", 1, &LIST, TypeArg::Inherit),
    ],
};

/// Track base class. Only used as a type argument; instances are always a
/// singing or an instrument track.
pub static ITRACK: ClassSpec = ClassSpec {
    name: "SingingTool.Model.ITrack",
    library: Some(MODEL_LIBRARY),
    role: ClassRole::Reference,
    fields: &[
        double("pan", "_pan", 9),
        string("name", "_name", 10),
        boolean("mute", "_mute", 11),
        boolean("solo", "_solo", 12),
        double("volume", "_volume", 8),
    ],
};

pub static SINGING_TRACK: ClassSpec = ClassSpec {
    name: "SingingTool.Model.SingingTrack",
    library: Some(MODEL_LIBRARY),
    role: ClassRole::Reference,
    fields: &[
        double("pan", "_pan", 9),
        string("name", "_name", 10),
        boolean("mute", "_mute", 11),
        boolean("solo", "_solo", 12),
        double("volume", "_volume", 8),
        generic("note_list", "_noteList", 0, &OVERLAPPABLE_LIST, TypeArg::Fixed(&NOTE)),
        boolean("need_refresh_base_metadata_flag", "_needRefreshBaseMetadataFlag", 1),
        line("edited_pitch_line", "_editedPitchLine", 2),
        line("edited_volume_line", "_editedVolumeLine", 3),
        line("edited_breath_line", "_editedBreathLine", 4),
        line("edited_gender_line", "_editedGenderLine", 5),
        line("edited_power_line", "_editedPowerLine", 6).present_if(has_power_line),
        object("reverb_preset", "_reverbPreset", 7, &REVERB_PRESET),
        string("ai_singer_id", "<AISingerId>k__BackingField", 13),
    ],
};

pub static INSTRUMENT_TRACK: ClassSpec = ClassSpec {
    name: "SingingTool.Model.InstrumentTrack",
    library: Some(MODEL_LIBRARY),
    role: ClassRole::Reference,
    fields: &[
        double("pan", "_pan", 9),
        string("name", "_name", 10),
        boolean("mute", "_mute", 11),
        boolean("solo", "_solo", 12),
        double("volume", "_volume", 8),
        double("sample_rate", "<SampleRate>k__BackingField", 14),
        int("sample_count", "<SampleCount>k__BackingField", 15),
        int("channel_count", "<ChannelCount>k__BackingField", 16),
        int("offset_in_pos", "<OffsetInPos>k__BackingField", 17),
        string("instrument_file_path", "<InstrumentFilePath>k__BackingField", 18),
    ],
};

/// Every class an X Studio project can contain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum XsClass {
    AppModel,
    BeatSize,
    SongBeat,
    SongTempo,
    LineParam,
    VibratoStyle,
    VibratoPercentInfo,
    NotePhoneInfo,
    NoteHeadTag,
    ReverbPreset,
    Note,
    List,
    OverlappableList,
    ITrack,
    SingingTrack,
    InstrumentTrack,
}

impl XsClass {
    pub const ALL: &'static [XsClass] = &[
        Self::AppModel,
        Self::BeatSize,
        Self::SongBeat,
        Self::SongTempo,
        Self::LineParam,
        Self::VibratoStyle,
        Self::VibratoPercentInfo,
        Self::NotePhoneInfo,
        Self::NoteHeadTag,
        Self::ReverbPreset,
        Self::Note,
        Self::List,
        Self::OverlappableList,
        Self::ITrack,
        Self::SingingTrack,
        Self::InstrumentTrack,
    ];

    /// Look up a wire type name without generic suffix.
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "SingingTool.Model.AppModel" => Self::AppModel,
            "SingingTool.Model.SingingGeneralConcept.BeatSize" => Self::BeatSize,
            "SingingTool.Model.SingingGeneralConcept.SongBeat" => Self::SongBeat,
            "SingingTool.Model.SingingGeneralConcept.SongTempo" => Self::SongTempo,
            "SingingTool.Model.Line.LineParam" => Self::LineParam,
            "SingingTool.Model.VibratoStyle" => Self::VibratoStyle,
            "SingingTool.Model.VibratoPercentInfo" => Self::VibratoPercentInfo,
            "SingingTool.Model.NotePhoneInfo" => Self::NotePhoneInfo,
            "SingingTool.Model.NoteHeadTag" => Self::NoteHeadTag,
            "SingingTool.Library.Audio.ReverbPreset" => Self::ReverbPreset,
            "SingingTool.Model.Note" => Self::Note,
            "System.Collections.Generic.List" => Self::List,
            "SingingTool.Library.SerialOverlapableItemList" => Self::OverlappableList,
            "SingingTool.Model.ITrack" => Self::ITrack,
            "SingingTool.Model.SingingTrack" => Self::SingingTrack,
            "SingingTool.Model.InstrumentTrack" => Self::InstrumentTrack,
            _ => return None,
        })
    }

    pub fn spec(self) -> &'static ClassSpec {
        match self {
            Self::AppModel => &APP_MODEL,
            Self::BeatSize => &BEAT_SIZE,
            Self::SongBeat => &SONG_BEAT,
            Self::SongTempo => &SONG_TEMPO,
            Self::LineParam => &LINE_PARAM,
            Self::VibratoStyle => &VIBRATO_STYLE,
            Self::VibratoPercentInfo => &VIBRATO_PERCENT_INFO,
            Self::NotePhoneInfo => &NOTE_PHONE_INFO,
            Self::NoteHeadTag => &NOTE_HEAD_TAG,
            Self::ReverbPreset => &REVERB_PRESET,
            Self::Note => &NOTE,
            Self::List => &LIST,
            Self::OverlappableList => &OVERLAPPABLE_LIST,
            Self::ITrack => &ITRACK,
            Self::SingingTrack => &SINGING_TRACK,
            Self::InstrumentTrack => &INSTRUMENT_TRACK,
        }
    }

    /// Variant for a spec taken from this schema.
    pub fn of(spec: &ClassSpec) -> Option<Self> {
        Self::from_name(spec.name)
    }
}

/// The X Studio schema: two libraries, written Model first.
#[derive(Debug, Clone, Copy, Default)]
pub struct XStudio;

impl Schema for XStudio {
    fn libraries(&self) -> &[&'static str] {
        &[MODEL_LIBRARY, LIBRARY_LIBRARY]
    }

    fn class_by_name(&self, name: &str) -> Option<&'static ClassSpec> {
        XsClass::from_name(name).map(XsClass::spec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nrbf_graph::Object;

    #[test]
    fn empty_lines_are_written_as_null() {
        let field = |name: &str| SINGING_TRACK.fields.iter().find(|f| f.name == name).unwrap();
        let empty: Value = Object::new(&LINE_PARAM)
            .with("line_param", Value::bytes(&[]))
            .unwrap()
            .into();
        let unset: Value = Object::new(&LINE_PARAM).into();
        let filled: Value = Object::new(&LINE_PARAM)
            .with("line_param", Value::bytes(&[0; 64]))
            .unwrap()
            .into();
        for name in ["edited_pitch_line", "edited_gender_line", "edited_power_line"] {
            assert!(field(name).writes_null(&empty), "{name}");
            assert!(field(name).writes_null(&unset), "{name}");
            assert!(!field(name).writes_null(&filled), "{name}");
        }
        assert!(!field("reverb_preset").writes_null(&empty));
    }

    #[test]
    fn name_table_matches_specs() {
        for &class in XsClass::ALL {
            assert_eq!(XsClass::from_name(class.spec().name), Some(class));
        }
        assert_eq!(XsClass::from_name("SingingTool.Model.Unknown"), None);
    }

    #[test]
    fn every_class_library_is_declared() {
        for &class in XsClass::ALL {
            if let Some(lib) = class.spec().library {
                assert!(XStudio.libraries().contains(&lib), "{}", class.spec().name);
            }
        }
    }

    #[test]
    fn singing_track_write_order() {
        let v7 = FormatVersion::new(7, 0, 0);
        let aliases: Vec<_> = SINGING_TRACK
            .write_order(&v7)
            .into_iter()
            .map(|(_, f)| f.alias)
            .collect();
        assert_eq!(
            aliases,
            [
                "_noteList",
                "_needRefreshBaseMetadataFlag",
                "_editedPitchLine",
                "_editedVolumeLine",
                "_editedBreathLine",
                "_editedGenderLine",
                "_editedPowerLine",
                "_reverbPreset",
                "_volume",
                "_pan",
                "_name",
                "_mute",
                "_solo",
                "<AISingerId>k__BackingField",
            ]
        );
        let v6 = SINGING_TRACK.write_order(&FormatVersion::new(6, 0, 0));
        assert!(v6.iter().all(|(_, f)| f.alias != "_editedPowerLine"));
        let v7_1 = SINGING_TRACK.write_order(&FormatVersion::new(7, 1, 0));
        assert!(v7_1.iter().all(|(_, f)| f.alias != "_editedPowerLine"));
    }

    #[test]
    fn vibrato_style_ties_keep_declaration_order() {
        let aliases: Vec<_> = VIBRATO_STYLE
            .write_order(&FormatVersion::new(6, 0, 0))
            .into_iter()
            .map(|(_, f)| f.alias)
            .collect();
        assert_eq!(aliases, ["_ampLine", "<IsAntiPhase>k__BackingField", "_freqLine"]);
    }

    #[test]
    fn note_writes_overlapped_after_head_tag() {
        let aliases: Vec<_> = NOTE
            .write_order(&FormatVersion::new(6, 0, 0))
            .into_iter()
            .map(|(_, f)| f.alias)
            .collect();
        assert_eq!(aliases[5], "_headTag");
        assert_eq!(aliases[6], "<Overlaped>k__BackingField");
    }
}
