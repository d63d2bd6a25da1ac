use std::sync::Arc;

use ncfactory_primitives::{ErrorKind, TextData};
use proptest::prelude::*;

use super::*;
use crate::orientation::CrystalAxis;
use crate::spy::RecordingSpy;

fn close(a: f64, b: f64) -> bool {
	(a - b).abs() < 1e-9
}

fn text(locator: &str, content: &str) -> Arc<TextData> {
	Arc::new(TextData::new(locator, "virtual", content))
}

fn single_crystal() -> MatCfg {
	MatCfg::parse(
		"Ge_sg227.ncmat;mosaicity=40arcsec;orientationprimary=@crystal_hkl:5,1,1@lab:0,0,1;\
		 orientationsecondary=@crystal_hkl:0,-1,1@lab:0,1,0",
	)
	.unwrap()
}

/// Temperatures given in any unit are stored in kelvin.
#[test]
fn test_temperature_units_normalize() {
	for raw in ["0C", "273.15", "273.15K", "32F"] {
		let cfg = MatCfg::parse(&format!("Al.ncmat;temp={raw}")).unwrap();
		assert!(close(cfg.temp(), 273.15), "{raw} -> {}", cfg.temp());
	}
}

#[test]
fn test_defaults_when_unset() {
	let cfg = MatCfg::parse("Al.ncmat").unwrap();
	assert!(close(cfg.temp(), 293.15));
	assert_eq!(cfg.dcutoff(), 0.0);
	assert_eq!(cfg.dcutoffupper(), f64::INFINITY);
	assert_eq!(cfg.nphonon(), 0);
	assert_eq!(cfg.scatterbkgdmodel(), "best");
	assert_eq!(cfg.mosaicity(), None);
	assert!(cfg.is_poly_crystal());
	assert!(!cfg.is_set(ParamId::Temp));
}

/// Clones alias the payload until one of them is written to.
#[test]
fn test_copy_on_write() {
	let a = MatCfg::parse("Al.ncmat;temp=300").unwrap();
	let mut b = a.clone();
	assert!(a.shares_storage(&b));
	assert_eq!(a.storage_refcount(), 2);

	b.set_temp(400.0).unwrap();
	assert!(!a.shares_storage(&b));
	assert_eq!(a.temp(), 300.0);
	assert_eq!(b.temp(), 400.0);
	assert_eq!(a.storage_refcount(), 1);

	let c = a.clone_unshared();
	assert!(!a.shares_storage(&c));
	assert_eq!(a, c);
}

/// The data holder follows every clone and is released with the last one.
#[test]
fn test_data_holder_follows_clones() {
	let holder: DataHolder = Arc::new(String::from("resolution"));
	let weak = Arc::downgrade(&holder);
	let mut cfg = MatCfg::parse_with_data("Al.ncmat", text("Al.ncmat", "")).unwrap();
	cfg.set_data_holder(holder);

	let mut hot = cfg.clone();
	hot.set_temp(600.0).unwrap();
	let unshared = cfg.clone_unshared();
	drop(cfg);
	assert!(hot.data_holder().is_some());
	assert!(weak.upgrade().is_some());

	drop(hot);
	drop(unshared);
	assert!(weak.upgrade().is_none());
}

/// Attached spies forbid mutation with a calculation error.
#[test]
fn test_spy_blocks_mutation() {
	let mut cfg = MatCfg::parse("Al.ncmat").unwrap();
	let spy: Arc<dyn AccessSpy> = RecordingSpy::new();
	cfg.add_access_spy(spy.clone());

	let err = cfg.set_temp(100.0).unwrap_err();
	assert_eq!(err.kind(), ErrorKind::CalcError);
	assert!(err.message().contains("temp"), "{err}");
	assert_eq!(cfg.apply_str_cfg("dcutoff=1").unwrap_err().kind(), ErrorKind::CalcError);
	assert_eq!(cfg.set_temp(-1.0).unwrap_err().kind(), ErrorKind::CalcError);

	assert!(cfg.remove_access_spy(&spy));
	assert!(!cfg.remove_access_spy(&spy));
	cfg.set_temp(100.0).unwrap();
	assert_eq!(cfg.temp(), 100.0);
}

#[test]
fn test_spy_records_reads_and_guard_detaches() {
	let cfg = MatCfg::parse("Al.ncmat;temp=10").unwrap();
	let spy = RecordingSpy::new();
	{
		let guard = cfg.spy(spy.clone());
		let _ = guard.cfg().temp();
		let _ = cfg.dcutoff();
		let _ = cfg.to_str_cfg(true, None);
		let _ = cfg.cache_signature(&[ParamId::PackingFactor]);
		assert!(cfg.has_access_spies());
		assert!(!cfg.clone().has_access_spies());
	}
	assert!(!cfg.has_access_spies());
	let _ = cfg.packingfactor();
	assert_eq!(spy.accessed(), vec![ParamId::Temp, ParamId::DCutoff]);
}

/// Embedded parameters apply first; explicit segments override them.
#[test]
fn test_embedded_config_precedence() {
	let data = text("Al.ncmat", "NCMAT v7\n# NCMATCFG[temp=20K;dcutoff=0.7]\n");
	let cfg = MatCfg::parse_with_data("Al.ncmat;temp=50K", data.clone()).unwrap();
	assert_eq!(cfg.temp(), 50.0);
	assert_eq!(cfg.dcutoff(), 0.7);
	assert!(Arc::ptr_eq(cfg.text_data().unwrap(), &data));

	let cfg = MatCfg::parse_with_data("Al.ncmat;ignorefilecfg", data).unwrap();
	assert!(cfg.ignored_embedded_config());
	assert!(!cfg.is_set(ParamId::DCutoff));
}

#[test]
fn test_embedded_config_errors() {
	let nested = text("a.ncmat", "# NCMATCFG[ignorefilecfg]");
	assert_eq!(
		MatCfg::parse_with_data("a.ncmat", nested).unwrap_err().kind(),
		ErrorKind::BadInput
	);
	let typo = text("b.ncmat", "# NCMATCFG[tmp=20]");
	let err = MatCfg::parse_with_data("b.ncmat", typo).unwrap_err();
	assert!(err.message().contains("b.ncmat"), "{err}");

	let broken = text("c.ncmat", "# NCMATCFG[temp=20]\n# NCMATCFG[temp=30]");
	assert!(MatCfg::parse_with_data("c.ncmat;ignorefilecfg", broken.clone()).is_ok());
	assert!(MatCfg::parse_with_data("c.ncmat", broken).is_err());
}

#[test]
fn test_consistency_rules() {
	let inconsistent = [
		"x.ncmat;braggonly;skipbragg",
		"x.ncmat;braggonly;dcutoff=-1",
		"x.ncmat;skipbragg;nphonon=-1",
		"x.ncmat;dcutoff=1;dcutoffupper=0.5",
		"x.ncmat;mosaicity=1deg",
		"x.ncmat;orientationtolerance=0.01",
		"x.ncmat;mosaicity=1deg;orientationprimary=@crystal:1,0,0@lab:0,0,1;\
		 orientationsecondary=@crystal:2,0,0@lab:0,1,0",
		"x.ncmat;mosaicity=1deg;orientationprimary=@crystal:1,0,0@lab:0,0,1;\
		 orientationsecondary=@crystal:0,1,0@lab:0,0,-3",
	];
	for d in inconsistent {
		let err = MatCfg::parse(d).unwrap().check_consistency().unwrap_err();
		assert_eq!(err.kind(), ErrorKind::BadInput, "{d}");
	}

	for d in ["x.ncmat;braggonly;dcutoff=0.2", "x.ncmat;skipbragg", "x.ncmat;dcutoffupper=2"] {
		MatCfg::parse(d).unwrap().check_consistency().unwrap();
	}
	single_crystal().check_consistency().unwrap();
}

/// NaN never reaches a cfg through the typed setters, so serialized cfgs
/// always parse back.
#[test]
fn test_setters_reject_nan() {
	let mut cfg = MatCfg::parse("Al.ncmat").unwrap();
	assert_eq!(cfg.set_dcutoffupper(f64::NAN).unwrap_err().kind(), ErrorKind::BadInput);
	assert_eq!(cfg.set_dcutoff(f64::NAN).unwrap_err().kind(), ErrorKind::BadInput);
	assert_eq!(cfg.set_packingfactor(f64::NAN).unwrap_err().kind(), ErrorKind::BadInput);
	for param in [ParamId::Temp, ParamId::DCutoffUpper, ParamId::OrientationTolerance] {
		assert!(cfg.set(param, ParamValue::Double(f64::NAN)).is_err(), "{param}");
	}
	assert!(MatCfg::parse("Al.ncmat;dcutoffupper=nan").is_err());

	cfg.set_dcutoffupper(f64::INFINITY).unwrap();
	cfg.set_dcutoffupper(3.0).unwrap();
	let text = cfg.to_str_cfg(true, None);
	assert!(text.starts_with("Al.ncmat;dcutoffupper="), "{text}");
	assert_eq!(MatCfg::parse(&text).unwrap().dcutoffupper(), 3.0);
}

#[test]
fn test_sc_orientation() {
	let cfg = single_crystal();
	assert!(cfg.is_single_crystal());
	let o = cfg.sc_orientation().unwrap();
	assert_eq!(o.primary.crystal, CrystalAxis::Hkl([5.0, 1.0, 1.0]));
	assert_eq!(o.tolerance, 1e-4);

	let mut other = MatCfg::parse("Ge_sg227.ncmat").unwrap();
	assert!(other.sc_orientation().is_err());
	other.set_orientation(o).unwrap();
	other.set_mosaicity(cfg.mosaicity().unwrap()).unwrap();
	other.check_consistency().unwrap();
	assert_eq!(other.sc_orientation().unwrap(), o);
}

/// Signatures depend only on the named parameters, not on their order.
#[test]
fn test_cache_signature() {
	let a = MatCfg::parse("Al.ncmat;temp=300;dcutoff=0.5;nphonon=4").unwrap();
	let b = MatCfg::parse("other.ncmat;nphonon=8;dcutoff=0.5;temp=300").unwrap();
	let names = [ParamId::Temp, ParamId::DCutoff];
	let reversed = [ParamId::DCutoff, ParamId::Temp, ParamId::DCutoff];
	assert_eq!(a.cache_signature(&names), b.cache_signature(&reversed));
	assert_eq!(a.cache_signature(&names), "dcutoff=0.5;temp=300.0");
	assert_ne!(a.cache_signature(&[ParamId::NPhonon]), b.cache_signature(&[ParamId::NPhonon]));

	let unset = MatCfg::parse("Al.ncmat").unwrap();
	assert_eq!(unset.cache_signature(&[ParamId::Mosaicity]), format!("mosaicity={UNSET_SENTINEL}"));
	assert_eq!(
		a.cache_signature_by_name(&["temp", "dcutoff"]).unwrap(),
		a.cache_signature(&names)
	);
	assert!(a.cache_signature_by_name(&["nonsense"]).is_err());
}

#[test]
fn test_str_cfg_forms() {
	let cfg = MatCfg::parse("Al.ncmat;ignorefilecfg;dcutoff=0.5;temp=20K;mosaicity=1deg").unwrap();
	assert_eq!(cfg.to_str_cfg(false, Some(&[ParamId::Temp])), "temp=20.0");
	assert!(cfg.to_str_cfg(true, None).starts_with("Al.ncmat;ignorefilecfg;temp=20.0;dcutoff=0.5;"));
	assert_eq!(cfg.to_string(), cfg.to_str_cfg(true, None));

	let embeddable = cfg.to_embeddable_cfg();
	let data = text("copy.ncmat", &format!("NCMAT v7\n# {embeddable}\n"));
	let reparsed = MatCfg::parse_with_data("copy.ncmat", data).unwrap();
	assert_eq!(reparsed.to_str_cfg(false, None), cfg.to_str_cfg(false, None));
}

#[test]
fn test_apply_str_cfg_is_all_or_nothing() {
	let mut cfg = MatCfg::parse("Al.ncmat").unwrap();
	assert!(cfg.apply_str_cfg("temp=10;packingfactor=7").is_err());
	assert!(!cfg.is_set(ParamId::Temp));
	cfg.apply_str_cfg("temp=10;packingfactor=0.5").unwrap();
	assert_eq!(cfg.packingfactor(), 0.5);
	assert!(cfg.apply_str_cfg("ignorefilecfg").is_err());
	cfg.unset(ParamId::Temp).unwrap();
	assert!(close(cfg.temp(), 293.15));
}

#[test]
fn test_data_file_extension() {
	let cfg = MatCfg::parse("dir/Al.ncmat").unwrap();
	assert_eq!(cfg.data_file_extension().as_deref(), Some("ncmat"));
	let cfg = MatCfg::parse("dir/Al.ncmat;overridefileext=laz").unwrap();
	assert_eq!(cfg.data_file_extension().as_deref(), Some("laz"));
	assert_eq!(MatCfg::parse("noext").unwrap().data_file_extension(), None);
}

#[test]
fn test_mosaicity_requires_units() {
	let err = MatCfg::parse("Ge.ncmat;mosaicity=0.01").unwrap_err();
	assert_eq!(err.kind(), ErrorKind::BadInput);
	assert!(MatCfg::parse("Ge.ncmat;mosaicity=0.01rad").is_ok());
}

fn segment() -> impl Strategy<Value = String> {
	prop_oneof![
		(1.0f64..2000.0).prop_map(|t| format!("temp={t}")),
		(-50.0f64..500.0).prop_map(|t| format!("temp={t}C")),
		(0.1f64..5.0).prop_map(|d| format!("dcutoff={d}")),
		(0.01f64..1.0).prop_map(|p| format!("packingfactor={p}")),
		(-1i32..10).prop_map(|n| format!("nphonon={n}")),
		(0.1f64..60.0).prop_map(|m| format!("mosaicity={m}arcmin")),
		any::<bool>().prop_map(|b| format!("braggonly={b}")),
		Just("expandhkl".to_string()),
		"[a-z]{1,8}".prop_map(|s| format!("infofactory={s}")),
		Just("orientationprimary=@crystal_hkl:1,1,0@lab:0,1,0".to_string()),
	]
}

proptest! {
	/// Serializing and re-parsing yields an equal configuration.
	#[test]
	fn test_str_cfg_round_trip(segments in prop::collection::vec(segment(), 0..8), ignore in any::<bool>()) {
		let mut descriptor = String::from("Mat.ncmat");
		if ignore {
			descriptor.push_str(";ignorefilecfg");
		}
		for s in &segments {
			descriptor.push(';');
			descriptor.push_str(s);
		}
		let cfg = MatCfg::parse(&descriptor).unwrap();
		let again = MatCfg::parse(&cfg.to_str_cfg(true, None)).unwrap();
		prop_assert_eq!(&cfg, &again);
		prop_assert_eq!(cfg.to_str_cfg(true, None), again.to_str_cfg(true, None));
	}
}
