//! Template insertion against a live graph

use pageweave_editor::{
    DocumentGraph, EditorError, EngineConfig, Node, NodeKind, NodeType, Placement, TemplateNode,
};

fn node(id: &str, parent: Option<&str>, kind: NodeKind) -> Node {
    Node::new(id, parent.map(str::to_string), kind)
}

fn page(pane_ids: &[&str], is_context: bool) -> NodeKind {
    NodeKind::Page {
        title: "Home".to_string(),
        slug: "home".to_string(),
        pane_ids: pane_ids.iter().map(|p| p.to_string()).collect(),
        is_context,
    }
}

fn graph() -> DocumentGraph {
    DocumentGraph::from_nodes(
        EngineConfig::default(),
        vec![
            node("doc", None, NodeKind::Document { title: String::new() }),
            node("page", Some("doc"), page(&["hero", "footer"], false)),
            node("hero", Some("page"), NodeKind::pane("Hero")),
            node("hero-bg", Some("hero"), NodeKind::Background {
                image_url: None,
                color: Some("white".to_string()),
                position: None,
            }),
            node("md", Some("hero"), NodeKind::markdown()),
            node("p", Some("md"), NodeKind::tag("p")),
            node("footer", Some("page"), NodeKind::pane("Footer")),
            node("context", Some("doc"), page(&["context-pane"], true)),
            node("context-pane", Some("context"), NodeKind::pane("About")),
        ],
    )
}

fn pane_ids(graph: &DocumentGraph, page_id: &str) -> Vec<String> {
    match graph.get_node(page_id).map(|n| &n.kind) {
        Some(NodeKind::Page { pane_ids, .. }) => pane_ids.clone(),
        _ => Vec::new(),
    }
}

fn pane_template() -> anyhow::Result<TemplateNode> {
    let template = serde_json::from_str(
        r#"{
            "nodeType": "pane",
            "title": "Call to action",
            "classes": { "padding": "lg" },
            "backgroundColor": "navy",
            "children": [
                { "nodeType": "background", "color": "navy" },
                { "nodeType": "markdown", "children": [
                    { "nodeType": "tag", "tagName": "h2", "children": [
                        { "nodeType": "tag", "tagName": "text", "text": "Join us" }
                    ] }
                ] }
            ]
        }"#,
    )?;
    Ok(template)
}

#[test]
fn test_add_template_pane_between_sections() -> anyhow::Result<()> {
    let mut graph = graph();
    let template = pane_template()?;

    let pane_id = graph
        .add_template_pane("page", &template, Some("footer"), Placement::Before)?
        .expect("pane inserted");

    assert_eq!(
        graph.get_child_node_ids("page"),
        vec!["hero".to_string(), pane_id.clone(), "footer".to_string()]
    );
    assert_eq!(pane_ids(&graph, "page"), graph.get_child_node_ids("page"));
    assert_eq!(graph.get_nodes_recursively(&pane_id).len(), 5);
    assert!(graph.check_integrity().is_empty());

    // One undo step removes the whole section
    assert!(graph.undo());
    assert!(graph.get_node(&pane_id).is_none());
    assert_eq!(pane_ids(&graph, "page"), vec!["hero".to_string(), "footer".to_string()]);
    assert!(!graph.can_undo());
    Ok(())
}

#[test]
fn test_add_template_pane_rejects_non_pane_templates() {
    let mut graph = graph();
    let template = TemplateNode::new(NodeKind::markdown());

    let result = graph.add_template_pane("page", &template, None, Placement::After);
    assert!(matches!(result, Err(EditorError::MalformedTemplate(_))));
    assert!(!graph.can_undo());
}

#[test]
fn test_add_template_pane_to_unknown_owner_is_a_noop() -> anyhow::Result<()> {
    let mut graph = graph();
    let template = pane_template()?;

    assert_eq!(graph.add_template_pane("missing", &template, None, Placement::After)?, None);
    assert_eq!(graph.add_template_pane("md", &template, None, Placement::After)?, None);
    assert!(!graph.can_undo());
    Ok(())
}

#[test]
fn test_add_template_node_into_section_synthesizes_markdown() -> anyhow::Result<()> {
    let mut graph = graph();
    let template = TemplateNode::new(NodeKind::tag("p"))
        .with_children(vec![TemplateNode::new(NodeKind::text("Hello"))]);

    let root = graph
        .add_template_node("hero", &template, None, Placement::After)?
        .expect("node inserted");

    let container = graph.get_node(&root).and_then(|n| n.parent_id.clone()).expect("parent");
    assert_eq!(graph.store().node_type(&container), Some(NodeType::Markdown));
    assert_eq!(graph.get_node(&container).and_then(|n| n.parent_id.as_deref()), Some("hero"));

    assert!(graph.undo());
    assert!(graph.get_node(&container).is_none());
    assert!(graph.get_node(&root).is_none());
    Ok(())
}

#[test]
fn test_media_outside_a_list_gets_list_and_item() -> anyhow::Result<()> {
    let mut graph = graph();
    let image = TemplateNode::new(NodeKind::tag("img"));

    let image_id = graph
        .add_template_node("md", &image, Some("p"), Placement::Before)?
        .expect("image inserted");

    let item = graph.get_node(&image_id).and_then(|n| n.parent_id.clone()).expect("item");
    let list = graph.get_node(&item).and_then(|n| n.parent_id.clone()).expect("list");
    assert!(graph.is_list_item(&item));
    assert!(graph.is_list(&list));
    assert_eq!(graph.get_child_node_ids("md"), vec![list.clone(), "p".to_string()]);

    // Auxiliary nodes go away with the same undo
    assert!(graph.undo());
    assert!(graph.get_node(&list).is_none());
    assert!(graph.get_node(&item).is_none());
    assert_eq!(graph.get_child_node_ids("md"), vec!["p".to_string()]);
    Ok(())
}

#[test]
fn test_media_inside_a_list_item_is_not_wrapped() -> anyhow::Result<()> {
    let mut graph = graph();
    graph.add_node(node("ul", Some("md"), NodeKind::tag("ul")));
    graph.add_node(node("li", Some("ul"), NodeKind::tag("li")));

    let image_id = graph
        .add_template_node("li", &TemplateNode::new(NodeKind::tag("code")), None, Placement::After)?
        .expect("widget inserted");
    assert_eq!(graph.get_node(&image_id).and_then(|n| n.parent_id.as_deref()), Some("li"));
    Ok(())
}

#[test]
fn test_context_pane_is_replaced_in_one_step() -> anyhow::Result<()> {
    let mut graph = graph();
    let template = pane_template()?;

    let pane_id = graph
        .add_context_template_pane("context", &template)?
        .expect("context pane");
    assert_eq!(graph.get_child_node_ids("context"), vec![pane_id.clone()]);
    assert_eq!(pane_ids(&graph, "context"), vec![pane_id]);
    assert!(graph.get_node("context-pane").is_none());
    assert_eq!(graph.history().undo_levels(), 1);

    assert!(graph.undo());
    assert_eq!(graph.get_child_node_ids("context"), vec!["context-pane".to_string()]);

    // Regular pages don't take context panes
    assert_eq!(graph.add_context_template_pane("page", &template)?, None);
    Ok(())
}

#[test]
fn test_apply_shell_keeps_content() -> anyhow::Result<()> {
    let mut graph = graph();
    let shell = pane_template()?;

    assert!(graph.apply_shell_to_pane("hero", &shell)?);

    match &graph.get_node("hero").expect("hero").kind {
        NodeKind::Pane {
            title,
            classes,
            background_color,
            ..
        } => {
            assert_eq!(title, "Hero");
            assert_eq!(classes.get("padding").map(String::as_str), Some("lg"));
            assert_eq!(background_color.as_deref(), Some("navy"));
        }
        other => panic!("expected a pane, got {:?}", other),
    }

    let children = graph.get_child_node_ids("hero");
    assert!(graph.get_node("hero-bg").is_none());
    assert_eq!(children.len(), 2);
    assert_eq!(graph.store().node_type(&children[0]), Some(NodeType::Background));
    assert_eq!(children[1], "md");
    assert!(graph.get_node("p").is_some());

    assert_eq!(graph.history().undo_levels(), 1);
    assert!(graph.undo());
    assert_eq!(
        graph.get_child_node_ids("hero"),
        vec!["hero-bg".to_string(), "md".to_string()]
    );
    Ok(())
}

#[test]
fn test_apply_shell_to_non_pane_is_rejected() -> anyhow::Result<()> {
    let mut graph = graph();
    assert!(!graph.apply_shell_to_pane("md", &pane_template()?)?);
    assert!(!graph.apply_shell_to_pane("missing", &pane_template()?)?);
    Ok(())
}

#[test]
fn test_shell_backgrounds_mark_their_section_dirty() -> anyhow::Result<()> {
    let mut graph = graph();
    graph.clear_dirty();

    let shell = TemplateNode::from_json(
        r#"{
            "nodeType": "pane",
            "title": "Backdrop",
            "children": [ { "nodeType": "background", "color": "navy" } ]
        }"#,
    )?;
    assert!(graph.apply_shell_to_pane("footer", &shell)?);

    let dirty: Vec<String> = graph.get_dirty_nodes().into_iter().map(|n| n.id).collect();
    assert!(dirty.contains(&"footer".to_string()), "dirty: {:?}", dirty);
    let children = graph.get_child_node_ids("footer");
    assert_eq!(children.len(), 1);
    assert!(dirty.contains(&children[0]));
    Ok(())
}
