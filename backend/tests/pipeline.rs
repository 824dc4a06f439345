//! End-to-end runs through the public API: file in, statements, ratios and
//! stored artifacts out.

use ledgerflow::chart::PrefixDef;
use ledgerflow::export::Artifact;
use ledgerflow::transform::RejectReason;
use ledgerflow::{
    run_bytes, run_file, shape, ArtifactStore, Category, ChartFile, ChartOfAccounts,
    CsvTableWriter, Granularity, Period, PipelineError, PipelineOptions, RatioValue, Undefined,
};
use rust_decimal_macros::dec;
use std::fs;

fn purchase_sale_chart() -> ChartOfAccounts {
    ChartOfAccounts::from_file(ChartFile {
        name: "purchases and sales".into(),
        accounts: vec![],
        prefixes: vec![
            PrefixDef {
                prefix: "601".into(),
                category: Category::Expense,
                subcategory: None,
            },
            PrefixDef {
                prefix: "701".into(),
                category: Category::Revenue,
                subcategory: None,
            },
        ],
    })
    .unwrap()
}

fn ratio(report: &ledgerflow::LedgerReport, key: &str) -> RatioValue {
    report
        .ratios
        .iter()
        .find(|r| r.key == key)
        .map(|r| r.value.clone())
        .unwrap()
}

#[test]
fn purchase_and_sale_give_half_margin() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger.csv");
    fs::write(
        &path,
        "Date;Account;Label;Debit;Credit\n\
         2023-04-02;601;Goods;100;\n\
         2023-04-03;701;Invoice 12;;200\n",
    )
    .unwrap();

    let report = run_file(&path, &purchase_sale_chart(), &PipelineOptions::default()).unwrap();
    let statements = &report.statements;

    assert_eq!(statements.category_totals(&statements.income_statement, Category::Expense), vec![dec!(100)]);
    assert_eq!(statements.category_totals(&statements.income_statement, Category::Revenue), vec![dec!(200)]);
    assert_eq!(ratio(&report, "net_margin"), RatioValue::Defined(dec!(0.5)));
}

#[test]
fn non_numeric_amount_is_rejected_and_the_rest_reported() {
    let sheet = "Date;Account;Label;Debit;Credit\n\
                 2023-04-02;601;Goods;100;\n\
                 2023-04-02;601;Typo;1O0;\n\
                 2023-04-03;701;Invoice 12;;200\n";

    let report = run_bytes(sheet.as_bytes(), &purchase_sale_chart(), &PipelineOptions::default()).unwrap();

    assert_eq!(report.rejected.len(), 1);
    assert!(matches!(report.rejected[0].reason, RejectReason::NonNumericAmount { .. }));
    assert!(report.rejected[0].reason.to_string().contains("non-numeric amount"));
    assert_eq!(report.statements.net_income(), vec![dec!(100)]);

    let rejected = shape(&report, Artifact::RejectedRows);
    assert_eq!(rejected.rows.len(), 1);
}

#[test]
fn empty_upload_produces_no_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::with_dir(dir.path());

    let err = run_bytes(b"", &purchase_sale_chart(), &PipelineOptions::default()).unwrap_err();
    assert!(matches!(err, PipelineError::EmptyInput { .. }));
    assert!(store.list().unwrap().is_empty());
}

#[test]
fn unknown_account_is_unclassified_not_dropped() {
    let sheet = "Date;Account;Label;Debit;Credit\n\
                 2023-04-02;601;Goods;100;\n\
                 2023-04-03;701;Invoice 12;;200\n\
                 2023-04-04;4711;Suspense;40;\n";

    let report = run_bytes(sheet.as_bytes(), &purchase_sale_chart(), &PipelineOptions::default()).unwrap();

    assert_eq!(report.entries.len(), 3);
    assert!(report.unclassified_accounts.contains("4711"));
    let item = report
        .line_items
        .iter()
        .find(|i| i.category == Category::Unclassified)
        .unwrap();
    assert_eq!(item.value, dec!(40));
    assert!(report.reconciliation.is_balanced());
}

#[test]
fn zero_denominator_ratio_is_undefined() {
    // Revenue is booked but nets to zero
    let sheet = "Date;Account;Label;Debit;Credit\n\
                 2023-04-02;601;Goods;10;\n\
                 2023-04-03;701;Invoice 12;;50\n\
                 2023-04-04;701;Credit note 12;50;\n";

    let report = run_bytes(sheet.as_bytes(), &purchase_sale_chart(), &PipelineOptions::default()).unwrap();

    assert_eq!(
        ratio(&report, "net_margin"),
        RatioValue::Undefined(Undefined::ZeroDenominator)
    );
    assert_eq!(
        ratio(&report, "current_ratio"),
        RatioValue::Undefined(Undefined::MissingLineItem("current assets"))
    );
}

#[test]
fn stored_job_serves_every_artifact() {
    let sheet = "Date;Account;Label;Debit;Credit\n\
                 2023-01-10;1020;Sale;300;\n\
                 2023-01-10;3200;Sale;;300\n";
    let report = run_bytes(sheet.as_bytes(), &ChartOfAccounts::swiss_sme(), &PipelineOptions::default()).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::with_dir(dir.path());
    let manifest = store
        .save_report(&report, &CsvTableWriter::default(), Some("ledger.csv"))
        .unwrap();

    for artifact in Artifact::ALL {
        let (path, info) = store.artifact_path(&manifest.job_id, artifact.slug()).unwrap();
        assert!(path.exists(), "missing {}", info.file);
    }

    let balance_sheet = fs::read_to_string(
        store.artifact_path(&manifest.job_id, "balance_sheet").unwrap().0,
    )
    .unwrap();
    assert!(balance_sheet.starts_with("Section;Line;2023"));
    assert!(manifest.balanced);
}

#[test]
fn huge_amounts_are_rejected_not_summed() {
    let sheet = "Date;Account;Label;Debit;Credit\n\
                 2023-04-02;601;Goods;79228162514264337593543950335;\n\
                 2023-04-02;601;Goods again;79228162514264337593543950335;\n\
                 2023-04-03;701;Invoice 12;;200\n";

    let report = run_bytes(sheet.as_bytes(), &purchase_sale_chart(), &PipelineOptions::default()).unwrap();

    assert_eq!(report.rejected.len(), 2);
    assert!(report
        .rejected
        .iter()
        .all(|r| r.reason.code() == "amount_out_of_range"));
    assert_eq!(report.statements.net_income(), vec![dec!(200)]);
}

#[test]
fn year_label_in_monthly_run_is_rejected() {
    let sheet = "Date;Account;Label;Debit;Credit\n\
                 2023;3200;Sales 2023;;1000\n\
                 2023-01-10;3200;Sale;;100\n";
    let options = PipelineOptions {
        granularity: Granularity::Month,
    };

    let report = run_bytes(sheet.as_bytes(), &ChartOfAccounts::swiss_sme(), &options).unwrap();

    assert_eq!(report.periods(), &[Period::Month { year: 2023, month: 1 }]);
    assert_eq!(report.rejected.len(), 1);
    assert_eq!(report.rejected[0].reason.code(), "period_too_coarse");
    assert_eq!(
        ratio(&report, "revenue_growth"),
        RatioValue::Undefined(Undefined::NoPriorPeriod)
    );
}

#[test]
fn opening_balance_counts_once_across_exports() {
    // Two yearly exports of the same ledger, one after the other
    let sheet = "Date;Account;Label;Debit;Credit\n\
                 Solde 01.01.2023 - 31.12.2023;;;;\n\
                 Report de solde;1020;;1000;\n\
                 Report de solde;2800;;;1000\n\
                 2023-06-01;1020;Sale;500;\n\
                 2023-06-01;3200;Sale;;500\n\
                 Solde 01.01.2024 - 31.12.2024;;;;\n\
                 Report de solde;1020;;1500;\n\
                 Report de solde;2800;;;1000\n\
                 2024-02-01;1020;Sale;100;\n\
                 2024-02-01;3200;Sale;;100\n";

    let report = run_bytes(sheet.as_bytes(), &ChartOfAccounts::swiss_sme(), &PipelineOptions::default()).unwrap();
    let statements = &report.statements;

    assert_eq!(report.rejected.len(), 2);
    assert!(report
        .rejected
        .iter()
        .all(|r| r.reason == RejectReason::DuplicateOpeningBalance));
    assert_eq!(
        statements.category_totals(&statements.balance_sheet, Category::Asset),
        vec![dec!(1500), dec!(1600)]
    );
    assert_eq!(statements.net_income(), vec![dec!(500), dec!(100)]);
}
