use std::path::PathBuf;

use ndarray_linalg::assert::close_l2;

use crate::auxiliary::lattice::KMesh;
use crate::auxiliary::template_models::TightBindingModel;
use crate::drivers::k2gamma::KPointUnfoldingParams;
use crate::io::{
    read_kunfold_binary, read_kunfold_yaml, write_kunfold_binary, write_kunfold_yaml,
    KUnfoldFileType,
};
use crate::target::mean_field::PeriodicMeanField;
use crate::target::SpinConstraint;

#[test]
fn test_io_file_type_paths() {
    assert_eq!(KUnfoldFileType::Pmf.ext(), "kunfold.pmf");
    assert_eq!(
        KUnfoldFileType::Scf.path("out/li_bcc"),
        PathBuf::from("out/li_bcc.kunfold.scf")
    );
}

#[test]
fn test_io_binary_mean_field() {
    let model = TightBindingModel::cubic_sp();
    let mesh = KMesh::new([2, 1, 1]).unwrap();
    let pmf = model.periodic_mean_field(&mesh, SpinConstraint::Restricted, &[2]);
    let dir = tempfile::tempdir().unwrap();
    let name = dir.path().join("cubic");
    write_kunfold_binary(&name, KUnfoldFileType::Pmf, &pmf).unwrap();
    assert!(dir.path().join("cubic.kunfold.pmf").exists());

    let read: PeriodicMeanField = read_kunfold_binary(&name, KUnfoldFileType::Pmf).unwrap();
    assert_eq!(read, pmf);
    close_l2(
        read.orbitals()[0][1].coefficients(),
        pmf.orbitals()[0][1].coefficients(),
        1e-14,
    );

    let missing = read_kunfold_binary::<PeriodicMeanField, _>(
        dir.path().join("absent"),
        KUnfoldFileType::Pmf,
    );
    assert!(missing.is_err());
}

#[test]
fn test_io_yaml_params() {
    let params = KPointUnfoldingParams::builder()
        .realise(false)
        .zero_eigenvalue_threshold(1e-9)
        .result_save_name(Some("li_bcc".to_string()))
        .build()
        .unwrap();
    let dir = tempfile::tempdir().unwrap();
    let name = dir.path().join("params");
    write_kunfold_yaml(&name, &params).unwrap();
    let read: KPointUnfoldingParams = read_kunfold_yaml(dir.path().join("params.yml")).unwrap();
    assert_eq!(read, params);
}
