// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn long_hourly_observation() {
    let name: UploadName = "ABCD00DNK_R_20191520000_01H_30S_MO.rnx.gz".parse().unwrap();
    assert_eq!(name.site9.as_deref(), Some("ABCD00DNK"));
    assert_eq!(name.site4, "ABCD");
    assert_eq!(name.year, 2019);
    assert_eq!(name.doy, 152);
    assert_eq!(name.hour, Hour::Of(0));
    assert_eq!(name.interval, Some(30));
    assert_eq!(name.kind, UploadKind::SeptentrioRnx3);
    assert!(!name.kind.is_single_file());
}

#[test]
fn long_hourly_navigation_has_no_interval() {
    let name: UploadName = "ABCD00DNK_R_20191520000_01H_GN.rnx.gz".parse().unwrap();
    assert_eq!(name.interval, None);
    assert_eq!(name.hour, Hour::Of(0));
}

#[test]
fn long_daily_forces_day_slot() {
    let name: UploadName = "KMS300DNK_R_20221590000_01D_30S_MO.rnx".parse().unwrap();
    assert_eq!(name.site9.as_deref(), Some("KMS300DNK"));
    assert_eq!(name.hour, Hour::Day);
    assert_eq!(name.doy, 159);
}

#[test]
fn long_afternoon_hour_letter() {
    let name: UploadName = "ABCD00DNK_R_20191521000_01H_30S_MO.rnx.gz".parse().unwrap();
    assert_eq!(name.hour, Hour::Of(10));
    assert_eq!(name.hour.letter(), 'k');
}

#[test]
fn long_rejects_odd_minutes() {
    assert_eq!(
        "ABCD00DNK_R_20191520015_01H_30S_MO.rnx.gz".parse::<UploadName>(),
        Err(FilenameError::NonZeroMinutes(15))
    );
}

#[test]
fn legacy_short_hourly() {
    let name: UploadName = "abcd152a.19o".parse().unwrap();
    assert_eq!(name.site4, "ABCD");
    assert_eq!(name.site9, None);
    assert_eq!(name.year, 2019);
    assert_eq!(name.doy, 152);
    assert_eq!(name.hour, Hour::Of(0));
    assert_eq!(name.kind, UploadKind::SeptentrioRaw);
    assert!(name.kind.is_single_file());
}

#[test]
fn legacy_short_daily_uses_24h_convention() {
    let name: UploadName = "abcd1520.19o".parse().unwrap();
    assert_eq!(name.hour, Hour::Day);
    assert_eq!(name.hh, 24);
}

#[test]
fn legacy_short_nineties_year() {
    let name: UploadName = "argi365x.99n".parse().unwrap();
    assert_eq!(name.year, 1999);
    assert_eq!(name.hour, Hour::Of(23));
}

#[test]
fn trimble_zip() {
    let name: UploadName = "ABCD201906010500B.zip".parse().unwrap();
    assert_eq!(name.site4, "ABCD");
    assert_eq!(name.year, 2019);
    assert_eq!(name.doy, 152); // June 1st, 2019
    assert_eq!(name.hour, Hour::Of(5));
    assert_eq!(name.kind, UploadKind::TrimbleZip);
}

#[test]
fn trimble_zip_rejects_bad_date() {
    assert_eq!(
        "ABCD201902300500B.zip".parse::<UploadName>(),
        Err(FilenameError::BadDate)
    );
}

#[test]
fn trimble_zip_rejects_odd_minutes() {
    assert_eq!(
        "ABCD201906010530B.zip".parse::<UploadName>(),
        Err(FilenameError::NonZeroMinutes(30))
    );
}

#[test]
fn leica_zip() {
    let name: UploadName = "abcd152a.19o.zip".parse().unwrap();
    assert_eq!(name.site4, "ABCD");
    assert_eq!(name.year, 2019);
    assert_eq!(name.doy, 152);
    assert_eq!(name.hour, Hour::Of(0));
    assert_eq!(name.kind, UploadKind::LeicaZip);
}

#[test]
fn leica_zip_with_zero_minutes() {
    let name: UploadName = "abcd152a00.19o.zip".parse().unwrap();
    assert_eq!(name.hour, Hour::Of(0));
}

#[test]
fn leica_zip_rejects_nonzero_minutes() {
    assert_eq!(
        "abcd152a30.19o.zip".parse::<UploadName>(),
        Err(FilenameError::NonZeroMinutes(30))
    );
}

#[test]
fn unrecognized_names() {
    for bad in [
        "",
        "README.txt",
        "abcd152a.19z",                       // unknown type letter
        "abc152a.19o",                        // short site
        "ABCD00DNK_R_2019152_01H_30S_MO.rnx", // truncated timestamp
        "ABCD00DNK_R_20191520000_01H_30S_MO.tar.gz",
    ] {
        assert_eq!(
            bad.parse::<UploadName>(),
            Err(FilenameError::Unrecognized),
            "accepted {bad:?}"
        );
    }
}

#[test]
fn doy_out_of_range_is_bad_date() {
    assert_eq!(
        "abcd999a.19o".parse::<UploadName>(),
        Err(FilenameError::BadDate)
    );
    assert_eq!(
        "abcd000a.19o".parse::<UploadName>(),
        Err(FilenameError::BadDate)
    );
}
