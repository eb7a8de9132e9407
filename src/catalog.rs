//! Default stand catalog for the club's board image
//!
//! Points are the top-left of each stand marker as a fraction of the image
//! width/height. There is no `18B` on the board.

use crate::models::{Location, LocationId};

/// Map name used for the bundled catalog
pub const DEFAULT_MAP: &str = "main";

/// Marker diameter as a fraction of the image width
pub const MARKER_DIAMETER: f64 = 18.0 / 1208.0;

const STANDS: &[(&str, f64, f64)] = &[
    ("1B", 0.290_735_099_337_748_3, 0.197_402_298_850_574_72),
    ("2B", 0.329_470_198_675_496_7, 0.289_910_600_255_427_86),
    ("3B", 0.447_847_682_119_205_3, 0.274_584_929_757_343_55),
    ("4B", 0.495_033_112_582_781_43, 0.231_162_196_679_438_05),
    ("5B", 0.25, 0.392_081_736_909_323_13),
    ("6B", 0.344_543_046_357_615_9, 0.395_636_015_325_670_5),
    ("7B", 0.436_258_278_145_695_34, 0.389_527_458_492_975_7),
    ("8B", 0.180_463_576_158_940_4, 0.501_915_708_812_260_6),
    ("9B", 0.274_834_437_086_092_73, 0.478_927_203_065_134_1),
    ("10B", 0.380_794_701_986_754_97, 0.509_578_544_061_302_7),
    ("11B", 0.457_953_642_384_105_96, 0.467_155_810_983_397_2),
    ("12B", 0.271_523_178_807_947, 0.667_943_805_874_840_4),
    ("13B", 0.304_635_761_589_404, 0.630_906_768_837_803_3),
    ("14B", 0.362_582_781_456_953_66, 0.613_026_819_923_371_6),
    ("15B", 0.366_721_854_304_635_8, 0.721_583_652_618_135_4),
    ("16B", 0.447_019_867_549_668_9, 0.744_572_158_365_261_8),
    ("17B", 0.185_430_463_576_158_94, 0.559_386_973_180_076_6),
    ("19B", 0.345_198_675_496_688_76, 0.747_126_436_781_609_2),
    ("20B", 0.315_397_350_993_377_46, 0.789_272_030_651_341),
    ("21B", 0.238_410_596_026_490_06, 0.736_909_323_116_219_7),
    ("22B", 0.187_086_092_715_231_8, 0.628_352_490_421_455_9),
];

/// All stands on the bundled board
pub fn default_locations() -> Vec<Location> {
    STANDS
        .iter()
        .filter_map(|&(name, x, y)| {
            LocationId::parse(name).map(|id| Location {
                id,
                name: name.to_string(),
                point: (x, y),
                map: DEFAULT_MAP.to_string(),
            })
        })
        .collect()
}

/// Marker center for a location rendered at `width` x `height` pixels
pub fn marker_center(location: &Location, width: f64, height: f64) -> (f64, f64) {
    let radius = MARKER_DIAMETER * width / 2.0;
    (location.point.0 * width + radius, location.point.1 * height + radius)
}
