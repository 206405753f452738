// ==========================================
// 表格行导入管道 - 导入器集成测试
// ==========================================
// 覆盖: 必填字段中止 / 出错继续 / after_run 恰好一次 / 别名优先级
//       跨字段清洗 / 计算字段 / 属性式行
// ==========================================


use serde::Serialize;
use std::cell::Cell;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tabular_import::importer::coercion;
use tabular_import::importer::{
    ContinueOnError, FieldSet, FieldSpec, ImportError, ImportHandler, ImportResult, Importer,
    ObjectRow, RowAccess, RowValues, RunPhase, RunState, Value,
};
use test_helpers::{map_row, Recorder};

fn id_and_name_fields() -> Vec<FieldSpec> {
    vec![
        FieldSpec::new("id").required().coerce(coercion::to_int),
        FieldSpec::new(["name", "full_name"]),
    ]
}

// ==========================================
// 必填字段缺失 → 默认策略中止，后续行不再读取
// ==========================================
#[test]
fn test_missing_required_field_aborts_and_stops_reading() {
    let source = vec![
        map_row(&[("id", "1"), ("full_name", "Ann")]),
        map_row(&[("name", "Bob")]),
        map_row(&[("id", "3"), ("name", "Cy")]),
    ];
    let rows_read = Cell::new(0usize);
    let rows = source.into_iter().inspect(|_| rows_read.set(rows_read.get() + 1));

    let mut importer = Importer::new(id_and_name_fields(), Recorder::default());
    let summary = importer.run(rows).unwrap();

    assert!(summary.aborted);
    assert_eq!(summary.phase, RunPhase::Aborted);
    assert_eq!(summary.rows_saved, 1);
    assert_eq!(summary.rows_processed, 2);
    assert_eq!(summary.exception_count, 1);
    assert_eq!(rows_read.get(), 2, "第 3 行不应被读取");

    let recorder = importer.handler();
    let expected: RowValues = [("id", Value::Int(1)), ("name", Value::from("Ann"))]
        .into_iter()
        .collect();
    assert_eq!(recorder.saved, vec![(0, expected)]);
    assert_eq!(recorder.required_missing, vec![1]);
    assert_eq!(recorder.after_run_count(), 1);
}

// ==========================================
// 出错继续 → 每行都失败时仍处理完全部行
// ==========================================
#[test]
fn test_continue_policy_processes_every_failing_row() {
    let rows: Vec<HashMap<String, String>> = (0..4).map(|i| map_row(&[("other", i.to_string().as_str())])).collect();

    let mut importer = Importer::new(id_and_name_fields(), ContinueOnError::new(Recorder::default()));
    let summary = importer.run(rows).unwrap();

    assert!(!summary.aborted);
    assert_eq!(summary.phase, RunPhase::Completed);
    assert_eq!(summary.rows_processed, 4);
    assert_eq!(summary.rows_saved, 0);
    assert_eq!(summary.exception_count, 4);
    assert!(!summary.is_clean());

    let recorder = importer.handler().inner();
    assert_eq!(recorder.required_missing, vec![0, 1, 2, 3]);
    assert_eq!(recorder.after_run_count(), 1);
}

#[test]
fn test_handler_policy_continue_mixed_rows() {
    let rows = vec![
        map_row(&[("id", "1")]),
        map_row(&[("id", "x")]),
        map_row(&[("id", "3")]),
    ];
    let mut importer = Importer::new(id_and_name_fields(), Recorder::continuing());
    let summary = importer.run(rows).unwrap();

    assert_eq!(summary.rows_saved, 2);
    assert_eq!(summary.exception_count, 1);
    let recorder = importer.handler();
    assert_eq!(recorder.errors.len(), 1);
    assert_eq!(recorder.errors[0].0, 1);
    assert!(recorder.errors[0].1.contains("int"));
    // 可选字段缺失 → Null
    assert_eq!(recorder.saved[0].1.get("name"), Some(&Value::Null));
}

// ==========================================
// after_run 在所有退出路径上恰好执行一次
// ==========================================
#[test]
fn test_after_run_once_on_configuration_error() {
    let fields = vec![FieldSpec::new("id"), FieldSpec::new(["id", "code"])];
    let mut importer = Importer::new(fields, Recorder::default());

    let err = importer.run(vec![map_row(&[("id", "1")])]).unwrap_err();
    assert!(err.is_configuration());
    assert_eq!(importer.state().phase, RunPhase::Failed);
    assert_eq!(importer.handler().events, vec!["before", "after"]);
    assert_eq!(importer.handler().after_run_count(), 1);
}

#[test]
fn test_after_run_once_when_before_run_fails() {
    let recorder = Recorder {
        fail_before_run: true,
        ..Recorder::default()
    };
    let mut importer = Importer::new(id_and_name_fields(), recorder);

    assert!(importer.run(vec![map_row(&[("id", "1")])]).is_err());
    assert!(importer.handler().saved.is_empty());
    assert_eq!(importer.handler().after_run_count(), 1);
}

#[test]
fn test_after_run_once_on_source_error() {
    let source: Vec<ImportResult<HashMap<String, String>>> = vec![
        Ok(map_row(&[("id", "1")])),
        Err(ImportError::FileReadError("disk gone".into())),
    ];
    let mut importer = Importer::new(id_and_name_fields(), Recorder::continuing());

    let err = importer.try_run(source).unwrap_err();
    assert!(err.is_source());
    assert_eq!(importer.state().phase, RunPhase::Failed);
    assert_eq!(importer.state().rows_saved, 1);
    assert_eq!(importer.handler().after_run_count(), 1);
}

#[test]
fn test_after_run_once_on_panic() {
    struct PanicOnSave(Recorder);

    impl ImportHandler for PanicOnSave {
        fn save(&mut self, _row_index: usize, _values: RowValues) -> ImportResult<()> {
            panic!("storage exploded");
        }

        fn after_run(&mut self, state: &RunState) {
            self.0.after_run(state);
        }
    }

    let recorder = Recorder::default();
    let after_runs = recorder.after_runs.clone();
    let mut importer = Importer::new(id_and_name_fields(), PanicOnSave(recorder));

    let result = catch_unwind(AssertUnwindSafe(|| {
        let _ = importer.run(vec![map_row(&[("id", "1")])]);
    }));
    assert!(result.is_err());
    assert_eq!(after_runs.load(std::sync::atomic::Ordering::SeqCst), 1);
    // 展开时阶段被标记为 Failed 后才交给 after_run
    let seen = importer.handler().0.final_state.as_ref().unwrap();
    assert_eq!(seen.phase, RunPhase::Failed);
}

#[test]
fn test_after_run_once_on_empty_source() {
    let mut importer = Importer::new(id_and_name_fields(), Recorder::default());
    let summary = importer.run(Vec::<HashMap<String, String>>::new()).unwrap();

    assert_eq!(summary.phase, RunPhase::Completed);
    assert_eq!(summary.rows_processed, 0);
    assert_eq!(importer.handler().events, vec!["before", "after"]);
}

// ==========================================
// 名称解析
// ==========================================
#[test]
fn test_alias_precedence_first_candidate_wins() {
    let rows = vec![
        map_row(&[("name", "Primary"), ("full_name", "Alias")]),
        map_row(&[("full_name", "Alias only")]),
        // 键存在但值为空，视为已找到
        map_row(&[("name", ""), ("full_name", "Ignored")]),
    ];
    let fields = vec![FieldSpec::new(["name", "full_name"]).required()];
    let mut importer = Importer::new(fields, Recorder::default());
    importer.run(rows).unwrap();

    let names: Vec<Value> = importer
        .handler()
        .saved
        .iter()
        .map(|(_, values)| values.get("name").cloned().unwrap_or_default())
        .collect();
    assert_eq!(
        names,
        vec![Value::from("Primary"), Value::from("Alias only"), Value::from("")]
    );
}

#[test]
fn test_attribute_style_rows() {
    #[derive(Serialize)]
    struct Person {
        code: u32,
        full_name: String,
    }

    let rows = vec![
        ObjectRow::new(&Person {
            code: 7,
            full_name: "Ann".into(),
        })
        .unwrap(),
    ];
    let fields = vec![
        FieldSpec::new(["id", "code"]).required(),
        FieldSpec::new(["name", "full_name"]),
    ];
    let mut importer = Importer::new(fields, Recorder::default());
    let summary = importer.run(rows).unwrap();

    assert!(summary.is_clean());
    let values = &importer.handler().saved[0].1;
    assert_eq!(values.get("id"), Some(&Value::Int(7)));
    assert_eq!(values.get("name"), Some(&Value::from("Ann")));
}

// ==========================================
// 清洗与计算字段
// ==========================================
#[test]
fn test_cross_field_cleaner_sees_earlier_fields() {
    let fields = FieldSet::builder()
        .field(FieldSpec::new("qty").coerce(coercion::to_int))
        .field(FieldSpec::new("price").coerce(coercion::to_float))
        .field(FieldSpec::computed("total", |_, _, _| Ok(Value::Null)))
        .cleaner("total", |_, values: &RowValues, _| {
            let qty = values.get("qty").and_then(Value::as_i64).unwrap_or(0);
            let price = values.get("price").and_then(Value::as_f64).unwrap_or(0.0);
            Ok(Value::Float(qty as f64 * price))
        })
        .build();

    let mut importer = Importer::new(fields, Recorder::default());
    importer
        .run(vec![map_row(&[("qty", "3"), ("price", "2.5")])])
        .unwrap();

    let values = &importer.handler().saved[0].1;
    assert_eq!(values.get("total"), Some(&Value::Float(7.5)));
    assert_eq!(values.keys().collect::<Vec<_>>(), vec!["qty", "price", "total"]);
}

#[test]
fn test_computed_field_reads_row_directly() {
    let fields = vec![FieldSpec::computed(
        "label",
        |row_index, row: &dyn RowAccess, _names: &[String]| {
            let first = row.lookup_key("first").unwrap_or_default();
            let last = row.lookup_key("last").unwrap_or_default();
            Ok(Value::Text(format!("{}:{} {}", row_index, first, last)))
        },
    )];
    let mut importer = Importer::new(fields, Recorder::default());
    importer
        .run(vec![map_row(&[("first", "Ann"), ("last", "Lee")])])
        .unwrap();

    assert_eq!(
        importer.handler().saved[0].1.get("label"),
        Some(&Value::from("0:Ann Lee"))
    );
}

#[test]
fn test_record_cleaner_runs_after_field_cleaners() {
    struct Stamping(Recorder);

    impl ImportHandler for Stamping {
        fn save(&mut self, row_index: usize, values: RowValues) -> ImportResult<()> {
            self.0.save(row_index, values)
        }

        fn clean_record(&mut self, row_index: usize, mut values: RowValues) -> ImportResult<RowValues> {
            values.insert("row", Value::Int(row_index as i64));
            Ok(values)
        }
    }

    let fields = vec![FieldSpec::new("code").clean(|_, _, v: Value| {
        Ok(Value::from(v.as_str().unwrap_or_default().to_uppercase()))
    })];
    let mut importer = Importer::new(fields, Stamping(Recorder::default()));
    importer.run(vec![map_row(&[("code", "ab")])]).unwrap();

    let values = &importer.handler().0.saved[0].1;
    assert_eq!(values.get("code"), Some(&Value::from("AB")));
    assert_eq!(values.get("row"), Some(&Value::Int(0)));
}
