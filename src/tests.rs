use hashbag::HashBag;
use itertools::Itertools;
use num_bigint::BigInt;
use std::iter::FromIterator;

use crate::{parse_relation, parse_relations, Database, Error, Predicate, Relation, Value};

const PRELUDE_SCENARIO: &str = "
Employees (EID, Name, Age, DID) = {E1, John, 32, D1
E2, Alice, 28, D2}
Departments (DID, Name) = {D1, Sales
D2, Marketing}
";

const PRELUDE_DUPLICATES: &str = "
R (a, b) = {1, 2
1, 2
3, 4}
S (a, b) = {3, 4
3, 4
5, 6}
Empty (a, b) = {}
Other (b1, b2) = {1, 2}
";

fn setup_db(prelude_code: &str) -> Database {
    let prelude_code = prelude_code.trim();
    if prelude_code.is_empty() {
        Database::sample()
    } else {
        Database::from(parse_relations(prelude_code).unwrap())
    }
}

fn run_query(prelude_code: &str, code: &str) -> Result<Relation, Error> {
    setup_db(prelude_code).query(code)
}

fn test_query(prelude_code: &str, code: &str, expected: &[&[Value]]) -> Relation {
    let result = run_query(prelude_code, code).unwrap();
    println!("{}", result);

    let result_rows = HashBag::from_iter(result.tuples().iter().map(|t| t.values()));
    let expected = HashBag::from_iter(expected.iter().map(|x| *x));
    assert_eq!(result_rows, expected);
    result
}

fn int(n: impl Into<BigInt>) -> Value {
    Value::Integer(n.into())
}

fn text(s: impl Into<String>) -> Value {
    Value::Text(s.into())
}

#[test]
fn test_base_relation_only() {
    let result = test_query(
        "",
        "Table1",
        &[&[int(1), int(2)], &[int(3), int(4)]],
    );
    assert_eq!(result.name(), "Table1");
}

#[test]
fn test_select() {
    let result = test_query(
        PRELUDE_SCENARIO,
        "select(Age>30)(Employees)",
        &[&[text("E1"), text("John"), int(32), text("D1")]],
    );
    assert_eq!(result.name(), "Employees");
    assert_eq!(result.attributes(), ["EID", "Name", "Age", "DID"]);
}

#[test]
fn test_select_text_literal() {
    test_query(
        "",
        "select(DID == 'D1')(Departments)",
        &[&[text("D1"), text("Sales")]],
    );
}

#[test]
fn test_select_preserves_order() {
    let result = run_query("", "select(Age < 30 or DID == 'D1')(Employees)").unwrap();
    let ids = result
        .tuples()
        .iter()
        .map(|t| t.values()[0].clone())
        .collect_vec();
    assert_eq!(ids, [text("E1"), text("E2"), text("E3")]);
}

#[test]
fn test_select_is_idempotent() {
    let once = run_query("", "select(Age > 28)(Employees)").unwrap();
    let twice = run_query("", "select(Age > 28)(select(Age > 28)(Employees))").unwrap();
    assert_eq!(once, twice);
}

#[test]
fn test_select_unknown_attribute_on_empty_relation() {
    assert_eq!(
        run_query(PRELUDE_DUPLICATES, "select(c > 1)(Empty)"),
        Err(Error::UnknownAttribute("c".to_owned()))
    );
}

#[test]
fn test_select_type_mismatch() {
    assert!(matches!(
        run_query("", "select(Age == '32')(Employees)"),
        Err(Error::TypeMismatch(_))
    ));
}

#[test]
fn test_select_predicate_syntax_error() {
    assert!(matches!(
        run_query("", "select(Age => 30)(Employees)"),
        Err(Error::PredicateSyntax(_))
    ));
}

#[test]
fn test_project() {
    let result = test_query(
        "",
        "project(Name, Age)(Employees)",
        &[
            &[text("John"), int(32)],
            &[text("Alice"), int(28)],
            &[text("Bob"), int(29)],
        ],
    );
    assert_eq!(result.attributes(), ["Name", "Age"]);
}

#[test]
fn test_project_reorders_and_keeps_duplicates() {
    test_query(
        "",
        "project(DID)(Employees)",
        &[&[text("D1")], &[text("D2")], &[text("D2")]],
    );

    let result = test_query(
        PRELUDE_SCENARIO,
        "project(Age, EID, Age)(Employees)",
        &[
            &[int(32), text("E1"), int(32)],
            &[int(28), text("E2"), int(28)],
        ],
    );
    assert_eq!(result.attributes(), ["Age", "EID", "Age"]);
    assert!(result.tuples().iter().all(|t| t.len() == 3));
}

#[test]
fn test_project_unknown_attribute() {
    assert_eq!(
        run_query("", "project(Height)(Employees)"),
        Err(Error::UnknownAttribute("Height".to_owned()))
    );
}

#[test]
fn test_chain_applies_outermost_operation_first() {
    // The outermost operation runs first: `select` sees Employees and
    // `project` sees the selected tuples.
    test_query(
        "",
        "select(Age > 30)(project(Name, Age)(Employees))",
        &[&[text("John"), int(32)]],
    );

    // Here `project` runs first and drops Age before `select` sees it.
    assert_eq!(
        run_query("", "project(Name)(select(Age > 30)(Employees))"),
        Err(Error::UnknownAttribute("Age".to_owned()))
    );
}

#[test]
fn test_join() {
    let result = test_query(
        PRELUDE_SCENARIO,
        "join(Employees, Departments) at DID = DID",
        &[
            &[
                text("E1"),
                text("John"),
                int(32),
                text("D1"),
                text("D1"),
                text("Sales"),
            ],
            &[
                text("E2"),
                text("Alice"),
                int(28),
                text("D2"),
                text("D2"),
                text("Marketing"),
            ],
        ],
    );
    assert_eq!(result.name(), "Employees JOIN Departments");
    assert_eq!(
        result.attributes(),
        [
            "Employees_EID",
            "Employees_Name",
            "Employees_Age",
            "Employees_DID",
            "Departments_DID",
            "Departments_Name",
        ]
    );
}

#[test]
fn test_join_qualifies_shared_attribute_names() {
    let prelude = "
R (x) = {1
2
2}
S (x) = {2
3}
";
    let result = test_query(
        prelude,
        "join(R, S) at x = x",
        &[&[int(2), int(2)], &[int(2), int(2)]],
    );
    assert_eq!(result.attributes(), ["R_x", "S_x"]);
}

#[test]
fn test_join_errors() {
    assert_eq!(
        run_query("", "join(Employees, Nobody) at DID = DID"),
        Err(Error::UnknownRelation("Nobody".to_owned()))
    );
    assert_eq!(
        run_query("", "join(Employees, Departments) at DID = Name2"),
        Err(Error::UnknownAttribute("Name2".to_owned()))
    );
    assert!(matches!(
        run_query("", "join(Employees, Table1) at Age = a1"),
        Ok(_)
    ));
    assert!(matches!(
        run_query("", "join(Employees, Table1) at Name = a1"),
        Err(Error::TypeMismatch(_))
    ));
}

#[test]
fn test_theta_join() {
    let database = Database::sample();
    let employees = database.get("Employees").unwrap();
    let departments = database.get("Departments").unwrap();

    let predicate =
        Predicate::parse("Employees_DID == Departments_DID and Employees_Age < 30").unwrap();
    let result = employees.theta_join(departments, &predicate).unwrap();
    assert_eq!(result.len(), 2);
    assert!(result
        .tuples()
        .iter()
        .all(|t| t.values()[5] == text("Marketing")));

    let predicate = Predicate::parse("DID == DID").unwrap();
    assert_eq!(
        employees.theta_join(departments, &predicate),
        Err(Error::UnknownAttribute("DID".to_owned()))
    );
}

#[test]
fn test_union() {
    let result = test_query(
        "",
        "union(Table1, Table2)",
        &[&[int(1), int(2)], &[int(3), int(4)], &[int(5), int(6)]],
    );
    assert_eq!(result.name(), "Table1 UNION Table2");
    assert_eq!(result.attributes(), ["a1", "a2"]);
}

#[test]
fn test_union_removes_all_duplicates() {
    test_query(
        PRELUDE_DUPLICATES,
        "union(R, S)",
        &[&[int(1), int(2)], &[int(3), int(4)], &[int(5), int(6)]],
    );
    test_query(PRELUDE_DUPLICATES, "union(R, Empty)", &[&[int(1), int(2)], &[int(3), int(4)]]);
}

#[test]
fn test_difference() {
    let result = test_query("", "difference(Table1, Table2)", &[&[int(3), int(4)]]);
    assert_eq!(result.name(), "Table1 DIFFERENCE Table2");
    test_query("", "difference(Table2, Table1)", &[&[int(5), int(6)]]);
}

#[test]
fn test_difference_keeps_left_duplicates() {
    test_query(
        PRELUDE_DUPLICATES,
        "difference(R, Empty)",
        &[&[int(1), int(2)], &[int(1), int(2)], &[int(3), int(4)]],
    );
    test_query(
        PRELUDE_DUPLICATES,
        "difference(R, S)",
        &[&[int(1), int(2)], &[int(1), int(2)]],
    );
}

#[test]
fn test_attribute_mismatch() {
    let prelude = "
Table1 (a1, a2) = {1, 2}
Table2 (b1, b2) = {1, 2}
Table3 (a2, a1) = {1, 2}
";
    assert_eq!(
        run_query(prelude, "union(Table1, Table2)"),
        Err(Error::AttributeMismatch {
            operation: "union",
            left: vec!["a1".to_owned(), "a2".to_owned()],
            right: vec!["b1".to_owned(), "b2".to_owned()],
        })
    );
    assert!(matches!(
        run_query(prelude, "difference(Table1, Table3)"),
        Err(Error::AttributeMismatch {
            operation: "difference",
            ..
        })
    ));
}

#[test]
fn test_binary_operation_inside_chain() {
    assert!(matches!(
        run_query("", "select(a1 > 1)(union(Table1, Table2))"),
        Err(Error::QuerySyntax(_))
    ));
}

#[test]
fn test_unknown_relation() {
    assert_eq!(
        run_query("", "select(Age > 30)(Managers)"),
        Err(Error::UnknownRelation("Managers".to_owned()))
    );
    assert_eq!(
        run_query("", "union(Table1, Table9)"),
        Err(Error::UnknownRelation("Table9".to_owned()))
    );
}

#[test]
fn test_operators_do_not_modify_inputs() {
    let database = Database::sample();
    let before = database.get("Employees").unwrap().clone();
    database
        .query("select(Age > 30)(project(Name, Age)(Employees))")
        .unwrap();
    database.query("join(Employees, Departments) at DID = DID").unwrap();
    assert_eq!(database.get("Employees"), Some(&before));
}

#[test]
fn test_display() {
    let relation = parse_relation("Departments (DID, Name) = {D1, Sales\nD2, Marketing}").unwrap();
    assert_eq!(
        relation.to_string(),
        "Departments(DID, Name) = {\n('D1', 'Sales')\n('D2', 'Marketing')\n}"
    );
}

fn reparse_display(relation: &Relation) -> Relation {
    let literal = relation
        .to_string()
        .lines()
        .map(|line| {
            line.strip_prefix('(')
                .and_then(|line| line.strip_suffix(')'))
                .unwrap_or(line)
        })
        .join("\n");
    parse_relation(&literal).unwrap()
}

#[test]
fn test_display_round_trip() {
    for relation in Database::sample().relations() {
        assert_eq!(&reparse_display(relation), relation);
    }
}

#[test]
fn test_display_round_trip_quoted_text() {
    let people = parse_relation("People (Name, Age) = {O'Brien, 40\n'say \"hi\"', 7}").unwrap();
    assert_eq!(
        people.to_string(),
        "People(Name, Age) = {\n(\"O'Brien\", 40)\n('say \"hi\"', 7)\n}"
    );
    assert_eq!(reparse_display(&people), people);

    let awkward = Relation::new(
        "Awkward",
        vec!["first name".to_owned(), "note".to_owned()],
        vec![
            vec![text("it's \"x\""), text("a\\b, c}")].into(),
            vec![text("32"), text(" padded ")].into(),
            vec![text("two\nlines"), text("")].into(),
        ],
    )
    .unwrap();
    assert_eq!(reparse_display(&awkward), awkward);
}

#[test]
fn test_display_round_trip_single_attribute() {
    let ids = parse_relation("Ids (id) = {1\n'x'}").unwrap();
    assert_eq!(ids.to_string(), "Ids(id) = {\n(1,)\n('x',)\n}");
    assert_eq!(reparse_display(&ids), ids);
}

#[test]
fn test_attribute_names_with_spaces() {
    let prelude = "T (first name, b) = {x, 1\ny, 2}";
    let result = test_query(prelude, "project(first name)(T)", &[&[text("x")], &[text("y")]]);
    assert_eq!(result.attributes(), ["first name"]);
}

#[test]
fn test_select_escaped_quote() {
    let prelude = "People (Name, Age) = {O'Brien, 40\nO'Hara, 31}";
    test_query(
        prelude,
        "select(Name == 'O\\'Brien')(People)",
        &[&[text("O'Brien"), int(40)]],
    );
    test_query(
        prelude,
        "select(Name == \"O'Hara\")(People)",
        &[&[text("O'Hara"), int(31)]],
    );
}
