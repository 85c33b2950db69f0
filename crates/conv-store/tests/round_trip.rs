use conv_core::MessageTree;
use conv_store::{SqliteStore, Store};

#[tokio::test]
async fn reloading_after_add_message_yields_an_identical_tree() {
    let store = SqliteStore::in_memory().await.unwrap();
    let thread = store.insert_thread(None, None).await.unwrap();

    let root = store.insert_message(thread, "root".into()).await.unwrap();
    let child = store.insert_message(thread, "child".into()).await.unwrap();
    store.insert_link(thread, root, child).await.unwrap();

    let mut tree = MessageTree::build(
        thread,
        store.fetch_messages(thread).await.unwrap(),
        store.fetch_links(thread).await.unwrap(),
    )
    .unwrap();
    tree.add_message(child, "child".into(), Some(root)).unwrap();

    let reloaded = MessageTree::build(
        thread,
        store.fetch_messages(thread).await.unwrap(),
        store.fetch_links(thread).await.unwrap(),
    )
    .unwrap();

    assert_eq!(tree.root_message_id, reloaded.root_message_id);
    assert_eq!(tree.index.len(), reloaded.index.len());
    for (id, node) in &tree.index {
        let reloaded_node = &reloaded.index[id];
        assert_eq!(node.parent_id, reloaded_node.parent_id);
        assert_eq!(node.child_ids, reloaded_node.child_ids);
    }
}
