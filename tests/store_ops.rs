//! Integration tests for store operations: clone, merge and the
//! accessor views, driven only through the public API.

use partio::{clone, clone_schema, merge, read, write, AttributeType, ParticleStore};

fn pipeline_store() -> ParticleStore {
    let mut store = ParticleStore::new();
    store
        .add_fixed_attribute("origin", AttributeType::Vector, 3)
        .expect("origin");
    store
        .add_fixed_attribute("uv", AttributeType::Float, 2)
        .expect("uv");
    store
        .add_fixed_attribute("sid", AttributeType::Int, 1)
        .expect("sid");

    let pos = store
        .add_attribute("position", AttributeType::Vector, 3)
        .expect("position");
    let life = store
        .add_attribute("life", AttributeType::Float, 2)
        .expect("life");
    let id = store
        .add_attribute("id", AttributeType::Int, 1)
        .expect("id");

    store.add_particles(5);
    let life_values = [-1.2f32, -0.2, 0.8, 1.8, 2.8];
    for i in 0..5 {
        store
            .data_mut::<f32>(&pos, i)
            .expect("pos")
            .copy_from_slice(&[i as f32, 0.0, -1.0]);
        store
            .data_mut::<f32>(&life, i)
            .expect("life")
            .copy_from_slice(&[life_values[i], 10.0]);
        store.data_mut::<i32>(&id, i).expect("id")[0] = i as i32;
    }
    store
}

#[test]
fn test_clone_schema_six_declarations_zero_particles() {
    let src = pipeline_store();
    let dst = clone_schema(&src);

    assert_eq!(dst.num_particles(), 0);
    assert_eq!(dst.num_attributes(), 3);
    assert_eq!(dst.num_fixed_attributes(), 3);

    let expected = [
        ("position", AttributeType::Vector, 3usize),
        ("life", AttributeType::Float, 2),
        ("id", AttributeType::Int, 1),
    ];
    for (name, ty, count) in expected {
        let attr = dst.attribute_info(name).expect(name);
        assert_eq!(attr.attr_type(), ty);
        assert_eq!(attr.count(), count);
    }
    let expected_fixed = [
        ("origin", AttributeType::Vector, 3usize),
        ("uv", AttributeType::Float, 2),
        ("sid", AttributeType::Int, 1),
    ];
    for (name, ty, count) in expected_fixed {
        let attr = dst.fixed_attribute_info(name).expect(name);
        assert_eq!(attr.attr_type(), ty);
        assert_eq!(attr.count(), count);
    }
}

#[test]
fn test_clone_copies_values() {
    let src = pipeline_store();
    let dst = clone(&src, true);

    assert_eq!(dst.num_particles(), 5);
    let id = dst.attribute_info("id").expect("id");
    let life = dst.attribute_info("life").expect("life");
    for i in 0..5 {
        assert_eq!(dst.data::<i32>(&id, i).expect("id")[0], i as i32);
        assert_eq!(dst.data::<f32>(&life, i).expect("life")[1], 10.0);
    }
}

#[test]
fn test_merge_counts_from_spec_example() {
    let mut base = pipeline_store();

    let mut delta = ParticleStore::new();
    let d_pos = delta
        .add_attribute("position", AttributeType::Vector, 3)
        .expect("position");
    let d_life = delta
        .add_attribute("life", AttributeType::Float, 2)
        .expect("life");
    let d_id = delta
        .add_attribute("id", AttributeType::Int, 1)
        .expect("id");
    delta.add_particles(3);
    for (j, id_val) in [1i32, 4, 100].iter().enumerate() {
        delta
            .data_mut::<f32>(&d_pos, j)
            .expect("pos")
            .copy_from_slice(&[50.0 + j as f32, 50.0, 50.0]);
        delta
            .data_mut::<f32>(&d_life, j)
            .expect("life")
            .copy_from_slice(&[99.0, 999.0]);
        delta.data_mut::<i32>(&d_id, j).expect("id")[0] = *id_val;
    }

    merge(&mut base, &delta, "id").expect("merge");

    // 5 base + (3 delta - 2 matched)
    assert_eq!(base.num_particles(), 6);

    let id = base.attribute_info("id").expect("id");
    let life = base.attribute_info("life").expect("life");
    let pos = base.attribute_info("position").expect("position");

    // matched ids 1 and 4 overwritten in place
    assert_eq!(base.data::<f32>(&life, 1).expect("life"), &[99.0, 999.0]);
    assert_eq!(base.data::<f32>(&pos, 4).expect("pos"), &[51.0, 50.0, 50.0]);
    // unmatched id 2 untouched
    assert_eq!(base.data::<f32>(&life, 2).expect("life"), &[0.8, 10.0]);
    // id 100 appended at the end
    assert_eq!(base.data::<i32>(&id, 5).expect("id")[0], 100);
    assert_eq!(base.data::<f32>(&life, 5).expect("life"), &[99.0, 999.0]);
}

#[test]
fn test_merge_after_file_roundtrip() {
    // A delta loaded from disk applies cleanly onto an in-memory base.
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("delta.bgeo");

    let mut base = pipeline_store();
    let delta_src = clone(&base, true);
    write(&path, &delta_src, false).expect("write delta");
    let delta = read(&path).expect("read delta");

    merge(&mut base, &delta, "id").expect("merge");
    // every delta id matches, nothing appends
    assert_eq!(base.num_particles(), 5);
}

#[test]
fn test_views_over_cloned_store() {
    let src = pipeline_store();
    let dst = clone(&src, true);
    let life = dst.attribute_info("life").expect("life");
    let view = dst.view::<f32>(&life).expect("view");
    assert_eq!(view.len(), 5);
    assert_eq!(view.count(), 2);
    let seconds: Vec<f32> = view.iter().map(|t| t[1]).collect();
    assert_eq!(seconds, vec![10.0; 5]);
}
