//! Full pipeline over the support-flow fixture.

use workflow_codegen::codegen::{self, CodegenOutput};
use workflow_codegen::config::CodegenConfig;
use workflow_codegen::error::{Phase, Severity};

const SUPPORT_FLOW: &str = include_str!("fixtures/support_flow.json");

fn generate() -> CodegenOutput {
    codegen::generate_json(SUPPORT_FLOW, CodegenConfig::default()).unwrap()
}

fn content<'o>(output: &'o CodegenOutput, path: &str) -> &'o str {
    match output.file(path) {
        Some(file) => &file.content,
        None => panic!("missing {}", path),
    }
}

#[test]
fn file_list() {
    let output = generate();
    let paths: Vec<&str> = output.files.iter().map(|f| f.path.as_str()).collect();
    assert_eq!(
        paths,
        vec![
            "support_flow/__init__.py",
            "support_flow/inputs.py",
            "support_flow/state.py",
            "support_flow/workflow.py",
            "support_flow/nodes/__init__.py",
            "support_flow/nodes/classify.py",
            "support_flow/nodes/route.py",
            "support_flow/nodes/billing_lookup/__init__.py",
            "support_flow/nodes/billing_lookup/workflow.py",
            "support_flow/nodes/billing_lookup/nodes/__init__.py",
            "support_flow/nodes/billing_lookup/nodes/fetch.py",
            "support_flow/nodes/escalate.py",
            "support_flow/nodes/final_answer.py",
        ]
    );
    assert!(output.diagnostics.is_empty(), "{:?}", output.diagnostics);
}

#[test]
fn workflow_module() {
    let output = generate();
    insta::assert_snapshot!(content(&output, "support_flow/workflow.py"), @r"
    from support_flow.inputs import Inputs
    from support_flow.nodes.billing_lookup import BillingLookup
    from support_flow.nodes.classify import Classify
    from support_flow.nodes.escalate import Escalate
    from support_flow.nodes.final_answer import FinalAnswer
    from support_flow.nodes.route import Route
    from support_flow.state import State
    from workflows import BaseWorkflow


    class SupportFlow(BaseWorkflow[Inputs, State]):
        graph = {Classify >> Route, Route.Ports.branch_1 >> BillingLookup, Route.Ports.branch_2 >> Escalate, BillingLookup >> FinalAnswer, Escalate >> FinalAnswer}

        class Outputs(BaseWorkflow.Outputs):
            answer = FinalAnswer.Outputs.value
    ");
}

#[test]
fn conditional_node_module() {
    let output = generate();
    insta::assert_snapshot!(content(&output, "support_flow/nodes/route.py"), @r#"
    from support_flow.nodes.classify import Classify
    from support_flow.state import State
    from workflows.nodes import ConditionalNode
    from workflows.ports import Port


    class Route(ConditionalNode):
        class Ports(ConditionalNode.Ports):
            branch_1 = Port.on_if(Classify.Outputs.category.equals("billing") & State.attempts.less_than(3))
            branch_2 = Port.on_else()
    "#);
}

#[test]
fn final_output_coalesces_through_wrapper_nodes() {
    let output = generate();
    insta::assert_snapshot!(content(&output, "support_flow/nodes/final_answer.py"), @r#"
    from support_flow.nodes.billing_lookup import BillingLookup
    from support_flow.nodes.classify import Classify
    from support_flow.nodes.escalate import Escalate
    from workflows.nodes import FinalOutputNode


    class FinalAnswer(FinalOutputNode):
        value = BillingLookup.Outputs.rows.coalesce(Escalate.Outputs.verdict).coalesce("no answer")
        runs = Classify.Execution.count

        class Outputs(FinalOutputNode.Outputs):
            value: str
    "#);
}

#[test]
fn external_references() {
    let output = generate();
    let classify = content(&output, "support_flow/nodes/classify.py");
    assert!(classify.contains(r#"api_key = SecretReference("OPENAI_API_KEY")"#), "{}", classify);
    assert!(classify.contains("text = Inputs.question\n"), "{}", classify);
    assert!(classify.contains(r#"channel = SlackMessage.channel.coalesce("web")"#), "{}", classify);
    assert!(classify.contains(r#"region = EnvironmentVariableReference(name="REGION")"#), "{}", classify);
    assert!(
        classify.contains("from workflows.references import EnvironmentVariableReference, SecretReference\n"),
        "{}",
        classify
    );
}

#[test]
fn nested_workflow_files() {
    let output = generate();
    let owner = content(&output, "support_flow/nodes/billing_lookup/__init__.py");
    assert!(owner.contains("class BillingLookup(MapNode):"), "{}", owner);
    assert!(owner.contains("items = Classify.Outputs.category\n"), "{}", owner);
    assert!(owner.contains("subworkflow = LookupItem\n"), "{}", owner);

    let nested = content(&output, "support_flow/nodes/billing_lookup/workflow.py");
    assert!(nested.contains("class LookupItem(BaseWorkflow):"), "{}", nested);
    assert!(nested.contains("graph = Fetch\n"), "{}", nested);
    assert!(nested.contains("rows = Fetch.Outputs.row\n"), "{}", nested);

    // Ancestor inputs stay importable from the nested scope.
    let fetch = content(&output, "support_flow/nodes/billing_lookup/nodes/fetch.py");
    assert!(fetch.contains("from support_flow.inputs import Inputs\n"), "{}", fetch);
    assert!(fetch.contains("question = Inputs.question\n"), "{}", fetch);
}

#[test]
fn root_index_and_inputs() {
    let output = generate();
    assert_eq!(
        content(&output, "support_flow/__init__.py"),
        "from .workflow import SupportFlow\n\n__all__ = [\"SupportFlow\"]\n"
    );
    let inputs = content(&output, "support_flow/inputs.py");
    assert!(inputs.contains("    question: str\n"), "{}", inputs);
    assert!(inputs.contains("    tone: str = \"friendly\"\n"), "{}", inputs);
    let state = content(&output, "support_flow/state.py");
    assert!(state.contains("class State(BaseState):\n    attempts: float = 0\n"), "{}", state);
}

#[test]
fn root_module_override() {
    let config = CodegenConfig {
        root_module: Some("bots.support".into()),
        ..CodegenConfig::default()
    };
    let output = codegen::generate_json(SUPPORT_FLOW, config).unwrap();
    assert_eq!(output.files[0].path, "bots/support/__init__.py");
    assert!(content(&output, "bots/support/workflow.py").contains("from bots.support.inputs import Inputs\n"));
}

#[test]
fn dangling_edge_is_reported_then_fatal_when_strict() {
    let broken = SUPPORT_FLOW.replace(r#""target_node_id": "n-final"}"#, r#""target_node_id": "n-gone"}"#);

    let lenient = codegen::generate_json(&broken, CodegenConfig::default()).unwrap();
    assert_eq!(lenient.diagnostics.len(), 1);
    assert_eq!(lenient.diagnostics[0].severity, Severity::Warning);
    assert_eq!(lenient.diagnostics[0].message, "Could not find node with id 'n-gone'");

    let errors = codegen::generate_json(&broken, CodegenConfig::strict()).unwrap_err();
    assert_eq!(errors[0].code, "R001");
    assert_eq!(errors[0].phase, Phase::Resolve);
}

#[test]
fn generation_is_deterministic() {
    assert_eq!(generate().files, generate().files);
}

#[test]
fn loop_between_nodes_defers_the_backward_import() {
    let looped = r#"{
        "label": "Loop Flow",
        "workflow_raw_data": {
            "nodes": [
                {"id": "a", "type": "GENERIC", "label": "Draft",
                 "inputs": [{"id": "a-in", "key": "feedback", "value": {"rules": [
                    {"type": "NODE_OUTPUT", "data": {"node_id": "b", "output_id": "b-out"}}
                 ]}}],
                 "outputs": [{"id": "a-out", "name": "text", "type": "STRING"}]},
                {"id": "b", "type": "GENERIC", "label": "Review",
                 "inputs": [{"id": "b-in", "key": "draft", "value": {"rules": [
                    {"type": "NODE_OUTPUT", "data": {"node_id": "a", "output_id": "a-out"}}
                 ]}}],
                 "outputs": [{"id": "b-out", "name": "notes", "type": "STRING"}]}
            ],
            "edges": [
                {"id": "e1", "source_node_id": "a", "target_node_id": "b"},
                {"id": "e2", "source_node_id": "b", "target_node_id": "a"}
            ]
        }
    }"#;
    let output = codegen::generate_json(looped, CodegenConfig::default()).unwrap();
    assert!(output.diagnostics.is_empty(), "{:?}", output.diagnostics);

    let draft = content(&output, "loop_flow/nodes/draft.py");
    assert!(draft.contains("feedback = LazyReference(lambda: Review.Outputs.notes)\n"), "{}", draft);
    let (head, tail) = draft.split_once("class Draft(").unwrap();
    assert!(!head.contains("import Review"), "{}", draft);
    assert!(head.contains("from workflows.references import LazyReference\n"), "{}", draft);
    assert!(tail.ends_with("\n\n\nfrom loop_flow.nodes.review import Review\n"), "{}", draft);

    let review = content(&output, "loop_flow/nodes/review.py");
    assert!(review.contains("draft = Draft.Outputs.text\n"), "{}", review);
    let (head, tail) = review.split_once("class Review(").unwrap();
    assert!(head.contains("from loop_flow.nodes.draft import Draft\n"), "{}", review);
    assert!(!tail.contains("import"), "{}", review);
}
