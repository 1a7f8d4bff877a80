use mesh_dofs::prelude::*;
use std::sync::Arc;

fn strip() -> Arc<Elements> {
    let nodes = Nodes::from_flat(2, &[0., 0., 1., 0., 2., 0., 0., 1., 1., 1., 2., 1.]).unwrap();
    let mut quads = Elements::new("quads", Arc::new(nodes), 4);
    quads.add_element(&[0, 1, 4, 3], 0).unwrap();
    quads.add_element(&[1, 2, 5, 4], 0).unwrap();
    Arc::new(quads)
}

fn bound() -> Dictionary {
    let regions = [(strip(), StateLayout::nodal(4))];
    DofBinder::new(BindConfig::point_based().with_name("velocity"))
        .bind(&NoComm, &regions)
        .unwrap()
}

#[test]
fn fields_follow_dictionary_size() {
    let mut dict = bound();
    assert_eq!(dict.size(), 6);
    let field = dict.create_field("u", 2).unwrap();
    assert_eq!(field.len(), 6);
    assert_eq!(field.row_size(), 2);
    field.row_mut(5).unwrap().copy_from_slice(&[1.0, -1.0]);

    assert_eq!(dict.field("u").unwrap().row(5).unwrap(), &[1.0, -1.0]);
    assert!(matches!(
        dict.create_field("u", 1),
        Err(MeshDofsError::Setup { .. })
    ));
    assert!(matches!(dict.field("p"), Err(MeshDofsError::ValueNotFound(_))));
    assert!(dict.check_sanity().is_ok());
    assert_eq!(dict.field_names().collect::<Vec<_>>(), vec!["u"]);
}

#[test]
fn resized_field_fails_sanity_check() {
    let mut dict = bound();
    dict.create_field("u", 1).unwrap();
    dict.field_mut("u").unwrap().resize(3).unwrap();
    assert!(matches!(
        dict.check_sanity(),
        Err(MeshDofsError::InvalidStructure(_))
    ));
}

#[test]
fn spaces_are_held_by_the_dictionary() {
    let dict = bound();
    let space = dict.space("quads").unwrap();
    assert_eq!(space.consumer(), Some("velocity"));
    let mut copy = space.clone();
    assert_eq!(
        copy.bind_consumer("pressure"),
        Err(MeshDofsError::AlreadyBound {
            space: "quads".into(),
            consumer: "velocity".into()
        })
    );
    assert!(dict.space("tris").is_err());
}

#[test]
fn connectivity_tables_link_to_the_element_space() {
    let dict = bound();
    let table = dict.space("quads").unwrap().connectivity().unwrap();
    assert_eq!(table.lookup(), Some(dict.elements().link()));
    let loc = table.locate(1, dict.elements()).unwrap();
    assert_eq!(loc.provider_index, 0);
    assert_eq!(loc.local, 1);
    let e = dict.locate_element(1).unwrap();
    assert_eq!(e.provider.support_name(), "quads");
    // the shared edge of the two quads
    let a = dict.dofs_for_unified_element(0).unwrap().into_owned();
    let b = dict.dofs_for_unified_element(1).unwrap().into_owned();
    assert_eq!(a[1], b[0]);
    assert_eq!(a[2], b[3]);
}
